use crate::image_pipeline::common::error::Fault;

/// Builds a vector of `len` copies of `value`, reporting allocation failure as
/// [`Fault::Alloc`] instead of aborting.
pub fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, Fault> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| Fault::Alloc(format!("{len} cells: {e}")))?;
    buf.resize(len, value);
    Ok(buf)
}

/// Resizes `buf` to `len` cells and overwrites every cell with `value`, keeping the
/// existing allocation when it is large enough.
pub fn try_refill<T: Clone>(buf: &mut Vec<T>, len: usize, value: T) -> Result<(), Fault> {
    buf.clear();
    buf.try_reserve_exact(len)
        .map_err(|e| Fault::Alloc(format!("{len} cells: {e}")))?;
    buf.resize(len, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refill_clears_stale_cells() {
        let mut buf = vec![7u16; 16];
        try_refill(&mut buf, 8, 0).unwrap();
        assert_eq!(buf, vec![0u16; 8]);
    }

    #[test]
    fn test_impossible_allocation_is_reported() {
        let result = try_filled::<[u16; 4]>(usize::MAX / 2, [0; 4]);
        assert!(matches!(result, Err(Fault::Alloc(_))));
    }
}
