use std::fmt;

use crate::error::BridgeError;
use crate::Result;

/// Number of work-items for a 1-D dispatch. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchRange {
    dim_x: i32,
}

impl LaunchRange {
    pub fn new_1d(dim_x: i32) -> Result<Self> {
        if dim_x <= 0 {
            return Err(BridgeError::InvalidRange(dim_x));
        }
        Ok(Self { dim_x })
    }

    pub fn dim_x(&self) -> i32 {
        self.dim_x
    }

    /// Total work-items.
    pub fn len(&self) -> usize {
        self.dim_x as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for LaunchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.dim_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(LaunchRange::new_1d(0), Err(BridgeError::InvalidRange(0))));
        assert!(matches!(LaunchRange::new_1d(-1), Err(BridgeError::InvalidRange(-1))));
        assert!(LaunchRange::new_1d(i32::MIN).is_err());
    }

    #[test]
    fn test_accepts_positive() {
        let r = LaunchRange::new_1d(1024).unwrap();
        assert_eq!(r.dim_x(), 1024);
        assert_eq!(r.len(), 1024);
        assert_eq!(format!("{}", r), "[1024]");
    }
}
