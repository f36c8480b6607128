//! Base-32 geohash codec used for spatial sharding.
//!
//! Three precisions matter to the service: partition keys (5, ~5 km),
//! sort keys (8, ~40 m) and the sparse index (4, ~40 km).

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Encode a coordinate to a geohash of the given precision.
///
/// Standard interleaved bisection: even bits halve the longitude range,
/// odd bits the latitude range, five bits per output character.
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut idx = 0usize;
    let mut bit = 0u8;

    while hash.len() < precision {
        if even_bit {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                idx = idx * 2 + 1;
                lon_range.0 = mid;
            } else {
                idx *= 2;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                idx = idx * 2 + 1;
                lat_range.0 = mid;
            } else {
                idx *= 2;
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;
        bit += 1;
        if bit == 5 {
            hash.push(BASE32[idx] as char);
            bit = 0;
            idx = 0;
        }
    }

    hash
}

/// Width and height in degrees of a geohash cell at the given precision.
pub fn cell_size(precision: usize) -> (f64, f64) {
    let bits = 5 * precision as u32;
    let lon_bits = (bits + 1) / 2;
    let lat_bits = bits / 2;
    (
        360.0 / (1u64 << lon_bits) as f64,
        180.0 / (1u64 << lat_bits) as f64,
    )
}

/// Every geohash at the given precision whose cell intersects the
/// rectangle. No duplicates; enumeration order is unspecified.
pub fn bboxes(lat_min: f64, lon_min: f64, lat_max: f64, lon_max: f64, precision: usize) -> Vec<String> {
    let (cell_w, cell_h) = cell_size(precision);
    let lat_min = lat_min.clamp(-90.0, 90.0);
    let lat_max = lat_max.clamp(-90.0, 90.0);
    let lon_min = lon_min.clamp(-180.0, 180.0);
    let lon_max = lon_max.clamp(-180.0, 180.0);

    let bits = 5 * precision as u32;
    let max_lon_idx = (1i64 << ((bits + 1) / 2)) - 1;
    let max_lat_idx = (1i64 << (bits / 2)) - 1;

    let lon_start = (((lon_min + 180.0) / cell_w).floor() as i64).clamp(0, max_lon_idx);
    let lon_end = (((lon_max + 180.0) / cell_w).floor() as i64).clamp(0, max_lon_idx);
    let lat_start = (((lat_min + 90.0) / cell_h).floor() as i64).clamp(0, max_lat_idx);
    let lat_end = (((lat_max + 90.0) / cell_h).floor() as i64).clamp(0, max_lat_idx);

    let mut hashes = Vec::with_capacity(
        ((lon_end - lon_start + 1) * (lat_end - lat_start + 1)) as usize,
    );
    for lat_idx in lat_start..=lat_end {
        let lat = -90.0 + (lat_idx as f64 + 0.5) * cell_h;
        for lon_idx in lon_start..=lon_end {
            let lon = -180.0 + (lon_idx as f64 + 0.5) * cell_w;
            hashes.push(encode(lat, lon, precision));
        }
    }

    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_hashes() {
        assert_eq!(encode(57.64911, 10.40744, 11), "u4pruydqqvj");
        assert_eq!(encode(42.6, -5.6, 5), "ezs42");
        assert_eq!(encode(40.7500, -73.9700, 5), "dr5ru");
    }

    #[test]
    fn test_encode_precision_prefixes() {
        let full = encode(51.5074, -0.1278, 8);
        assert_eq!(encode(51.5074, -0.1278, 5), full[..5]);
        assert_eq!(encode(51.5074, -0.1278, 4), full[..4]);
    }

    #[test]
    fn test_bboxes_cover_contained_points() {
        let hashes = bboxes(40.70, -74.02, 40.78, -73.94, 5);
        for (lat, lon) in [(40.70, -74.02), (40.78, -73.94), (40.75, -73.97)] {
            let hash = encode(lat, lon, 5);
            assert!(hashes.contains(&hash), "missing {hash} for ({lat}, {lon})");
        }
    }

    #[test]
    fn test_bboxes_no_duplicates() {
        let hashes = bboxes(40.70, -74.02, 40.78, -73.94, 5);
        let unique: std::collections::HashSet<_> = hashes.iter().collect();
        assert_eq!(unique.len(), hashes.len());
    }

    #[test]
    fn test_bboxes_point_box_single_cell() {
        let hashes = bboxes(40.75, -73.97, 40.75, -73.97, 5);
        assert_eq!(hashes, vec![encode(40.75, -73.97, 5)]);
    }
}
