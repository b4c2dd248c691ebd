//! Small multilayer perceptron: one ReLU hidden layer and a softmax head.

mod model;
mod train;

pub use model::MlpModel;
pub use train::{MlpOptions, train_mlp};

use crate::features::FeatureVector;
use crate::ml::{
    Classifier, EpochReport, FitConfig, FitError, InferenceError, LabelDistribution,
    TrainingBatch,
};

/// [`Classifier`] backed by an [`MlpModel`] that is replaced on every fit.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    options: MlpOptions,
    model: Option<MlpModel>,
}

impl MlpClassifier {
    pub fn new(options: MlpOptions) -> Self {
        Self {
            options,
            model: None,
        }
    }

    /// Fitted weights, once [`Classifier::fit`] has succeeded.
    pub fn model(&self) -> Option<&MlpModel> {
        self.model.as_ref()
    }
}

impl Classifier for MlpClassifier {
    fn name(&self) -> &str {
        "mlp"
    }

    fn untrained(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.options.clone()))
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn predict(&self, features: &FeatureVector) -> Result<LabelDistribution, InferenceError> {
        let model = self.model.as_ref().ok_or(InferenceError::NotTrained)?;
        model.predict_proba(features.as_slice())
    }

    fn fit(
        &mut self,
        batch: &TrainingBatch,
        config: &FitConfig,
        on_epoch: &mut dyn FnMut(EpochReport),
    ) -> Result<(), FitError> {
        let model = train_mlp(batch, &self.options, config, on_epoch)?;
        self.model = Some(model);
        Ok(())
    }
}
