//! Capacity policy for the renderer's growable arrays
//!
//! Every array grows to `max(needed, floor) + capacity / 2` once it runs out
//! of room. Growth goes through `try_reserve_exact` so a failed allocation
//! becomes a [`RenderError::ResourceExhausted`] instead of an abort.

use crate::error::{RenderError, Result};

pub const TEXTURE_FLOOR: usize = 4;
pub const PIPELINE_FLOOR: usize = 128;
pub const CALL_FLOOR: usize = 128;
pub const PATH_FLOOR: usize = 128;
pub const UNIFORM_FLOOR: usize = 128;
pub const VERTEX_FLOOR: usize = 4096;

/// Capacity after growing an array of `capacity` to hold `needed` elements
pub fn grown_capacity(capacity: usize, needed: usize, floor: usize) -> usize {
    needed.max(floor) + capacity / 2
}

/// Make room for `additional` more elements, following the growth policy
pub fn reserve<T>(vec: &mut Vec<T>, additional: usize, floor: usize) -> Result<()> {
    let needed = vec
        .len()
        .checked_add(additional)
        .ok_or_else(|| RenderError::ResourceExhausted("array length overflow".into()))?;
    if needed <= vec.capacity() {
        return Ok(());
    }
    let target = grown_capacity(vec.capacity(), needed, floor);
    vec.try_reserve_exact(target - vec.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_growth_uses_floor() {
        let mut v: Vec<u32> = Vec::new();
        reserve(&mut v, 1, CALL_FLOOR).unwrap();
        assert_eq!(v.capacity(), CALL_FLOOR);
    }

    #[test]
    fn test_growth_adds_half_capacity() {
        assert_eq!(grown_capacity(128, 129, 128), 129 + 64);
        assert_eq!(grown_capacity(4096, 5000, 4096), 5000 + 2048);
        assert_eq!(grown_capacity(0, 10_000, 4096), 10_000);
    }

    #[test]
    fn test_no_growth_when_room_remains() {
        let mut v: Vec<u32> = Vec::with_capacity(10);
        reserve(&mut v, 10, 4).unwrap();
        assert_eq!(v.capacity(), 10);
    }

    #[test]
    fn test_growth_preserves_contents() {
        let mut v: Vec<u32> = Vec::new();
        for i in 0..1000u32 {
            reserve(&mut v, 1, TEXTURE_FLOOR).unwrap();
            v.push(i);
        }
        assert!(v.iter().enumerate().all(|(i, x)| *x == i as u32));
    }

    #[test]
    fn test_overflow_is_exhaustion() {
        let mut v: Vec<u8> = vec![0];
        let err = reserve(&mut v, usize::MAX, 4).unwrap_err();
        assert!(matches!(err, RenderError::ResourceExhausted(_)));
    }
}
