//! Hyperparameters handed to the external trainer.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// When the trainer saves, evaluates or logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStrategy {
    No,
    Steps,
    Epoch,
}

/// Trainer arguments. Field names match the framework's keyword arguments so
/// the struct serializes straight into its constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArguments {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_batch_size")]
    pub per_device_train_batch_size: u32,
    #[serde(default = "default_batch_size")]
    pub per_device_eval_batch_size: u32,
    #[serde(default = "default_epochs")]
    pub num_train_epochs: u32,
    #[serde(default = "default_best_metric")]
    pub metric_for_best_model: String,
    #[serde(default = "default_strategy")]
    pub save_strategy: IntervalStrategy,
    /// Checkpoints kept on disk; older ones are deleted.
    #[serde(default = "default_save_total_limit")]
    pub save_total_limit: Option<u32>,
    #[serde(default = "default_true")]
    pub load_best_model_at_end: bool,
    #[serde(default = "default_strategy")]
    pub logging_strategy: IntervalStrategy,
    #[serde(default = "default_strategy", alias = "evaluation_strategy")]
    pub eval_strategy: IntervalStrategy,
    #[serde(default = "default_true")]
    pub dataloader_drop_last: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            per_device_train_batch_size: default_batch_size(),
            per_device_eval_batch_size: default_batch_size(),
            num_train_epochs: default_epochs(),
            metric_for_best_model: default_best_metric(),
            save_strategy: default_strategy(),
            save_total_limit: default_save_total_limit(),
            load_best_model_at_end: true,
            logging_strategy: default_strategy(),
            eval_strategy: default_strategy(),
            dataloader_drop_last: true,
            seed: default_seed(),
        }
    }
}

fn default_learning_rate() -> f64 {
    5e-6
}

fn default_batch_size() -> u32 {
    32
}

fn default_epochs() -> u32 {
    25
}

/// The trainer prefixes metrics of a named eval split with `eval_<split>_`,
/// so best-model tracking has to name the split.
fn default_best_metric() -> String {
    "validation_f1".to_string()
}

fn default_strategy() -> IntervalStrategy {
    IntervalStrategy::Epoch
}

fn default_save_total_limit() -> Option<u32> {
    Some(1)
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

impl TrainingArguments {
    /// Reject settings the trainer would refuse after loading the model.
    pub fn validate(&self) -> Result<(), MlError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(MlError::invalid_input(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.per_device_train_batch_size == 0 || self.per_device_eval_batch_size == 0 {
            return Err(MlError::invalid_input("batch sizes must be at least 1"));
        }
        if self.num_train_epochs == 0 {
            return Err(MlError::invalid_input("num_train_epochs must be at least 1"));
        }
        if self.metric_for_best_model.trim().is_empty() {
            return Err(MlError::invalid_input("metric_for_best_model is empty"));
        }
        if self.load_best_model_at_end && self.save_strategy != self.eval_strategy {
            return Err(MlError::invalid_input(format!(
                "load_best_model_at_end needs matching save and eval strategies ({:?} vs {:?})",
                self.save_strategy, self.eval_strategy
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixed_schedule() {
        let args = TrainingArguments::default();
        assert_eq!(args.num_train_epochs, 25);
        assert_eq!(args.learning_rate, 5e-6);
        assert_eq!(args.per_device_train_batch_size, 32);
        assert_eq!(args.per_device_eval_batch_size, 32);
        assert_eq!(args.metric_for_best_model, "validation_f1");
        assert_eq!(args.save_total_limit, Some(1));
        assert!(args.load_best_model_at_end);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_serializes_as_trainer_kwargs() {
        let value = serde_json::to_value(TrainingArguments::default()).unwrap();
        assert_eq!(value["save_strategy"], json!("epoch"));
        assert_eq!(value["eval_strategy"], json!("epoch"));
        assert_eq!(value["dataloader_drop_last"], json!(true));
    }

    #[test]
    fn test_accepts_legacy_evaluation_strategy() {
        let args: TrainingArguments =
            serde_json::from_value(json!({"evaluation_strategy": "steps", "save_strategy": "steps"}))
                .unwrap();
        assert_eq!(args.eval_strategy, IntervalStrategy::Steps);
        assert_eq!(args.num_train_epochs, 25);
    }

    #[test]
    fn test_validate_rejects_mismatched_strategies() {
        let args = TrainingArguments {
            save_strategy: IntervalStrategy::Steps,
            ..Default::default()
        };
        assert!(matches!(args.validate(), Err(MlError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_zero_epochs() {
        let args = TrainingArguments {
            num_train_epochs: 0,
            ..Default::default()
        };
        assert!(args.validate().is_err());
    }
}
