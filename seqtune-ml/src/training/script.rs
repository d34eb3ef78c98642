//! Entry point executed by the Python interpreter.
//!
//! The script reads the run file written by [`super::TrainingDriver::prepare`]
//! and hands everything to the framework's `Trainer`. Both validation and test
//! splits are evaluated every epoch, which yields the `eval_validation_*` and
//! `eval_test_*` keys the checkpoint selector consumes.

use std::io;
use std::path::{Path, PathBuf};

/// File name of the generated script inside the output directory.
pub const SCRIPT_FILE: &str = "seqtune_train.py";

/// Python packages the script imports.
pub const REQUIRED_PACKAGES: &[&str] = &["datasets", "evaluate", "numpy", "transformers"];

const TRAINER_SCRIPT: &str = r#"import json
import sys

import evaluate
import numpy as np
from datasets import load_dataset
from transformers import (
    AutoModelForSequenceClassification,
    AutoTokenizer,
    Trainer,
    TrainingArguments,
)

with open(sys.argv[1]) as f:
    run = json.load(f)

print("seqtune run", run["id"], "model", run["model_checkpoint"], flush=True)

dataset = load_dataset("json", data_files=run["data_files"])
tokenizer = AutoTokenizer.from_pretrained(
    run["model_checkpoint"], use_fast=run["tokenizer"]["use_fast"]
)
model = AutoModelForSequenceClassification.from_pretrained(
    run["model_checkpoint"], num_labels=run["num_labels"]
)
f1 = evaluate.load("f1")


def preprocess(examples):
    return tokenizer(examples["text"], truncation=run["tokenizer"]["truncation"])


encoded = dataset.map(preprocess, batched=True)


def compute_metrics(eval_pred):
    logits, labels = eval_pred
    predictions = np.argmax(logits, axis=1)
    return f1.compute(predictions=predictions, references=labels, average="macro")


args = TrainingArguments(run["output_dir"], **run["training_args"])
trainer = Trainer(
    model,
    args,
    train_dataset=encoded["train"],
    eval_dataset={"validation": encoded["validation"], "test": encoded["test"]},
    tokenizer=tokenizer,
    compute_metrics=compute_metrics,
)
trainer.train()
trainer.save_state()
"#;

/// Write the trainer script into `dir`, returning its path.
pub fn write_script(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(SCRIPT_FILE);
    crate::persistence::atomic_write(&path, TRAINER_SCRIPT.as_bytes())?;
    Ok(path)
}
