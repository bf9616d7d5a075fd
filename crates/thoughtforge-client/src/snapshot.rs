// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Model snapshots used to seed a session with previously learned weights
//!
//! The snapshot is opaque to the client. It only converts between `ndarray` arrays
//! and the nested JSON lists the server expects:
//! `{"weights": [<nested list per array>], "values": [..]}`.

use crate::error::{ClientError, Result};
use ndarray::{Array1, ArrayD, ArrayViewD, Axis, IxDyn};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSnapshot {
    pub weights: Vec<ArrayD<f64>>,
    pub values: Array1<f64>,
}

impl ModelSnapshot {
    pub fn new(weights: Vec<ArrayD<f64>>, values: Array1<f64>) -> Self {
        Self { weights, values }
    }

    /// Body sent with `/initSession`
    pub fn to_wire(&self) -> Value {
        let weights: Vec<Value> = self
            .weights
            .iter()
            .map(|array| array_to_nested(array.view()))
            .collect();
        let values: Vec<Value> = self.values.iter().map(|v| json!(v)).collect();
        json!({ "weights": weights, "values": values })
    }

    /// Parse the `model_data` section of a saved model file
    pub fn from_json(model_data: &Value) -> Result<Self> {
        let weights = model_data
            .get("weights")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode("model_data.weights must be a list".to_string()))?
            .iter()
            .enumerate()
            .map(|(index, nested)| {
                nested_to_array(nested).map_err(|reason| {
                    ClientError::Decode(format!("model_data.weights[{}]: {}", index, reason))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let values = model_data
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode("model_data.values must be a list".to_string()))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| ClientError::Decode(format!("model_data.values: {} is not a number", v)))
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Self {
            weights,
            values: Array1::from(values),
        })
    }
}

fn array_to_nested(view: ArrayViewD<'_, f64>) -> Value {
    if view.ndim() == 0 {
        return view.iter().next().map_or(Value::Null, |v| json!(v));
    }
    Value::Array(
        view.axis_iter(Axis(0))
            .map(array_to_nested)
            .collect(),
    )
}

fn nested_to_array(nested: &Value) -> std::result::Result<ArrayD<f64>, String> {
    let mut shape = Vec::new();
    let mut probe = nested;
    while let Value::Array(items) = probe {
        shape.push(items.len());
        match items.first() {
            Some(first) => probe = first,
            None => break,
        }
    }

    let mut flat = Vec::with_capacity(shape.iter().product());
    flatten_into(nested, &shape, &mut flat)?;
    ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|e| e.to_string())
}

fn flatten_into(value: &Value, shape: &[usize], out: &mut Vec<f64>) -> std::result::Result<(), String> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) => {
            if items.len() != len {
                return Err(format!("ragged nesting: expected {} items, found {}", len, items.len()));
            }
            items.iter().try_for_each(|item| flatten_into(item, rest, out))
        }
        (Value::Number(n), None) => {
            out.push(n.as_f64().ok_or_else(|| format!("{} is not representable as f64", n))?);
            Ok(())
        }
        (other, _) => Err(format!("unexpected element {}", other)),
    }
}
