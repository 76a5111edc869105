use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::settings::MAX_DYNAMIC_SHAPES;

/// Marks an axis whose extent is not known when the graph is built.
pub const UNKNOWN_DIM: i32 = -1;

/// Static shape plus the concrete shapes the operand may take per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub data: Vec<i32>,
    #[serde(default)]
    pub dynamic: Vec<Vec<i32>>,
    /// Set on output placeholders until inference writes a shape. A pending
    /// shape has no rank, unlike an empty `data` which is a scalar.
    #[serde(default)]
    pub pending: bool,
}

impl Dimensions {
    pub fn new(data: Vec<i32>) -> Self {
        Self {
            data,
            dynamic: Vec::new(),
            pending: false,
        }
    }

    /// Shape of an operand whose type inference has not reached yet.
    pub fn pending() -> Self {
        Self {
            data: Vec::new(),
            dynamic: Vec::new(),
            pending: true,
        }
    }

    pub fn with_dynamic(data: Vec<i32>, dynamic: Vec<Vec<i32>>) -> Result<Self, ModelError> {
        let dims = Self {
            data,
            dynamic,
            pending: false,
        };
        dims.validate()?;
        Ok(dims)
    }

    pub fn rank(&self) -> usize {
        self.data.len()
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic.len()
    }

    pub fn has_unknown(&self) -> bool {
        self.data.iter().any(|dim| *dim == UNKNOWN_DIM)
    }

    /// Element count of the static shape, when every axis is known.
    pub fn production(&self) -> Option<usize> {
        if self.pending {
            return None;
        }
        self.data.iter().try_fold(1usize, |acc, dim| {
            if *dim < 0 {
                None
            } else {
                acc.checked_mul(*dim as usize)
            }
        })
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.pending && !(self.data.is_empty() && self.dynamic.is_empty()) {
            return Err(ModelError::InvalidType(
                "a pending shape cannot carry dimensions".to_string(),
            ));
        }
        if self.dynamic.len() > MAX_DYNAMIC_SHAPES {
            return Err(ModelError::InvalidType(format!(
                "{} dynamic shapes exceed the limit of {}",
                self.dynamic.len(),
                MAX_DYNAMIC_SHAPES
            )));
        }
        if let Some(dim) = self.data.iter().find(|dim| **dim < UNKNOWN_DIM) {
            return Err(ModelError::InvalidType(format!(
                "dimension {} is neither known nor the unknown marker",
                dim
            )));
        }
        for (idx, shape) in self.dynamic.iter().enumerate() {
            if shape.len() != self.data.len() {
                return Err(ModelError::InvalidType(format!(
                    "dynamic shape {} has rank {}, expected {}",
                    idx,
                    shape.len(),
                    self.data.len()
                )));
            }
            if shape.iter().any(|dim| *dim < 0) {
                return Err(ModelError::InvalidType(format!(
                    "dynamic shape {} must be fully known, got {:?}",
                    idx, shape
                )));
            }
        }
        Ok(())
    }
}
