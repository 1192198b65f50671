pub trait IsClose<Rhs = Self> {
    fn is_close(&self, other: &Rhs, abs_tol: f64, rel_tol: f64) -> Result<(), String>;
}

impl IsClose<f64> for f64 {
    fn is_close(&self, other: &f64, abs_tol: f64, rel_tol: f64) -> Result<(), String> {
        let abs_diff = (self - other).abs();
        let max_abs = self.abs().max(other.abs());
        let tolerance = rel_tol.mul_add(max_abs, abs_tol).max(abs_tol);
        if abs_diff > tolerance {
            return Err(format!(
                "Scalar differs: actual {}, expected {}, abs_diff {}, tolerance {}",
                self, other, abs_diff, tolerance
            ));
        }
        Ok(())
    }
}

impl IsClose<&[f64]> for &[f64] {
    fn is_close(&self, other: &&[f64], abs_tol: f64, rel_tol: f64) -> Result<(), String> {
        if self.len() != other.len() {
            return Err(format!(
                "Slice lengths differ: actual {}, expected {}",
                self.len(),
                other.len()
            ));
        }
        let mut errors = Vec::new();
        for (idx, (a, b)) in self.iter().zip(other.iter()).enumerate() {
            if let Err(err) = a.is_close(b, abs_tol, rel_tol) {
                errors.push(format!("Element at index {}: {}", idx, err));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
