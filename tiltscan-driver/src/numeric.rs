/// Value `i/n` of the way from `from` to `to`.
pub(crate) fn lerp(from: f64, to: f64, i: usize, n: usize) -> f64 {
    from + (i as f64) / (n as f64) * (to - from)
}

pub(crate) fn radian_to_degree(radian: f64) -> f64 {
    radian * 180. / std::f64::consts::PI
}
