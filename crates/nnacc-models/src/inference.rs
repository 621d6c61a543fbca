// SPDX-License-Identifier: AGPL-3.0-only

//! Running a model on a backend

use crate::error::{ModelError, Result};
use crate::model::NetworkModel;
use nnacc_driver::{classify, confidence, Fixed, InferenceBackend};
use tracing::debug;

/// Outcome of one inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Output-layer values.
    pub outputs: Vec<Fixed>,
    /// Index of the first maximum output.
    pub class: usize,
    /// Normalized score of `class`.
    pub confidence: f32,
    /// Cycles, when the backend models time.
    pub cycles: Option<u64>,
}

impl NetworkModel {
    /// Stream `input` and the parameters through `backend`.
    ///
    /// The backend's activation table should match [`NetworkModel::activation_table`].
    ///
    /// # Errors
    ///
    /// Returns error if the input does not fit the model or the backend fails.
    pub fn infer(&self, backend: &mut dyn InferenceBackend, input: &[Fixed]) -> Result<Prediction> {
        let stream = self.stream(input, backend.config().num_parallel)?;
        let outputs = backend.infer(self.topology(), &stream)?;
        if outputs.len() != self.topology().output_size() {
            return Err(ModelError::shape_mismatch(format!(
                "backend returned {} outputs, expected {}",
                outputs.len(),
                self.topology().output_size()
            )));
        }
        let class = classify(&outputs);
        let confidence = confidence(&outputs, class);
        debug!("{} prediction: class {class} ({confidence:.3})", backend.backend_type());
        Ok(Prediction {
            outputs,
            class,
            confidence,
            cycles: backend.last_cycles(),
        })
    }

    /// Stream `input` given as floats (rounded and saturated to Q4.11).
    ///
    /// # Errors
    ///
    /// As [`NetworkModel::infer`].
    pub fn infer_f32(&self, backend: &mut dyn InferenceBackend, input: &[f32]) -> Result<Prediction> {
        let input: Vec<Fixed> = input.iter().copied().map(Fixed::from_f32).collect();
        self.infer(backend, &input)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{DenseLayer, NetworkModel};
    use nnacc_driver::{AcceleratorConfig, CycleBackend, SoftwareBackend};

    fn model() -> NetworkModel {
        let l1 = DenseLayer::from_f32(3, 4, &[0.0, 1.0, -1.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], &[0.0, 0.5, -0.5, 1.0]).unwrap();
        let l2 = DenseLayer::from_f32(4, 2, &[0.0, 2.0, -1.0, 1.0, 0.0, 0.0, 0.0, 0.0], &[-1.0, 1.0]).unwrap();
        NetworkModel::new(vec![l1, l2]).unwrap()
    }

    #[test]
    fn backends_agree_on_a_prediction() {
        let m = model();
        let config = AcceleratorConfig::default().with_num_parallel(2);
        let mut cycle = CycleBackend::new(config.clone()).unwrap();
        let mut soft = SoftwareBackend::new(config).unwrap();
        let input = [0.25, 1.0, 0.5];

        let a = m.infer_f32(&mut cycle, &input).unwrap();
        let b = m.infer_f32(&mut soft, &input).unwrap();
        assert_eq!(a.outputs, b.outputs);
        assert_eq!(a.class, b.class);
        assert!(a.cycles.is_some());
        assert!(b.cycles.is_none());
        assert!(a.confidence > 0.0 && a.confidence <= 1.0);
    }

    #[test]
    fn wrong_input_length_is_rejected() {
        let mut soft = SoftwareBackend::new(AcceleratorConfig::default()).unwrap();
        assert!(model().infer_f32(&mut soft, &[1.0]).is_err());
    }
}
