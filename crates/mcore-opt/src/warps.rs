//! Distribution of warps over the output tile.

/// Warps along M and N for an `m x n` result computed with
/// `m_dim x n_dim` instructions by `num_warps` warps.
///
/// Chained multiplies put every warp along M. Otherwise the count along
/// one dimension is doubled at a time, preferring M while its remaining
/// tiles per warp (counted in pairs of instructions) are at least those
/// along N; the pair is swapped at the end if N would be overrun.
pub fn warps_per_tile(
    (m, n): (u32, u32),
    num_warps: u32,
    (m_dim, n_dim): (u32, u32),
    chained: bool,
) -> [u32; 2] {
    if chained {
        return [num_warps, 1];
    }

    let mut ret = [1u32, 1];
    while ret[0] * ret[1] < num_warps {
        if m / (2 * m_dim) / ret[0] >= n / n_dim / ret[1] {
            if ret[0] < m / m_dim {
                ret[0] *= 2;
            } else {
                ret[1] *= 2;
            }
        } else {
            ret[1] *= 2;
        }
    }

    if ret[1] * n_dim > n {
        ret.swap(0, 1);
    }
    ret
}
