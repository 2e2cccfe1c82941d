//! Operator type inference for layer records.
//!
//! Layer records carry no operator type, so one is guessed from the attribute
//! names and the input/output arity. This is a structural fingerprint and is
//! approximate: any operator that happens to carry `perm`, say, is reported as
//! a transpose. Rules are evaluated top to bottom and the first match wins,
//! which is also how records matching several rules are disambiguated.

use crate::metadata::LayerRecord;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
pub enum OperatorType {
    Conv,
    Transpose,
    Constant,
    #[strum(to_string = "ReLU")]
    Activation,
    Reshape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub op_type: OperatorType,
    pub height: f32,
}

pub struct ClassifierRule {
    pub name: &'static str,
    pub op_type: OperatorType,
    pub height: f32,
    pub matches: fn(&LayerRecord) -> bool,
}

const CONV_ATTRIBUTES: [&str; 4] = ["kernel_shape", "dilations", "pads", "strides"];

fn has_conv_attributes(layer: &LayerRecord) -> bool {
    CONV_ATTRIBUTES.iter().any(|x| layer.has_attribute(x))
}

fn has_perm(layer: &LayerRecord) -> bool {
    layer.has_attribute("perm")
}

fn has_value(layer: &LayerRecord) -> bool {
    layer.has_attribute("value")
}

fn is_unary_without_attributes(layer: &LayerRecord) -> bool {
    layer.input_tensors.len() == 1
        && layer.output_tensors.len() == 1
        && layer.attribute_names.is_empty()
}

fn always(_layer: &LayerRecord) -> bool {
    true
}

pub const CLASSIFIER_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        name: "conv attributes",
        op_type: OperatorType::Conv,
        height: 140.0,
        matches: has_conv_attributes,
    },
    ClassifierRule {
        name: "perm attribute",
        op_type: OperatorType::Transpose,
        height: 100.0,
        matches: has_perm,
    },
    ClassifierRule {
        name: "value attribute",
        op_type: OperatorType::Constant,
        height: 80.0,
        matches: has_value,
    },
    ClassifierRule {
        name: "unary without attributes",
        op_type: OperatorType::Activation,
        height: 80.0,
        matches: is_unary_without_attributes,
    },
    ClassifierRule {
        name: "fallback",
        op_type: OperatorType::Reshape,
        height: 100.0,
        matches: always,
    },
];

pub fn classify(layer: &LayerRecord) -> Classification {
    CLASSIFIER_RULES
        .iter()
        .find(|rule| (rule.matches)(layer))
        .map(|rule| Classification {
            op_type: rule.op_type,
            height: rule.height,
        })
        .unwrap_or(Classification {
            op_type: OperatorType::Reshape,
            height: 100.0,
        })
}
