use super::Tensor;
use std::fmt;

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "形状: {:?}", self.shape())?;

        let values = self.to_vec();
        const MAX_SHOWN: usize = 8;
        if values.len() <= MAX_SHOWN {
            for v in &values {
                write!(f, "{:8.4} ", v)?;
            }
        } else {
            for v in &values[..MAX_SHOWN / 2] {
                write!(f, "{:8.4} ", v)?;
            }
            write!(f, "  ..  ")?;
            for v in &values[values.len() - MAX_SHOWN / 2..] {
                write!(f, "{:8.4} ", v)?;
            }
        }
        writeln!(f)
    }
}
