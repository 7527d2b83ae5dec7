//! Lambert Conformal Conic projection on the GRS80 ellipsoid.
//!
//! The deployment-local projection for metropolitan France is RGF93 /
//! Lambert-93 (EPSG:2154), a secant conic with standard parallels at 44°N
//! and 49°N. Forward maps (longitude, latitude) in degrees to (easting,
//! northing) in meters; inverse recovers degrees from meters.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// GRS80 semi-major axis (meters).
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening.
const GRS80_INV_F: f64 = 298.257_222_101;

/// Iterations of the inverse-latitude fixed point. Converges to well below
/// millimeter precision in far fewer steps at French latitudes.
const INVERSE_ITERATIONS: usize = 12;

/// Lambert Conformal Conic projection parameters and derived constants.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians.
    lon0: f64,
    /// False easting (meters).
    x0: f64,
    /// False northing (meters).
    y0: f64,
    /// Ellipsoid eccentricity.
    e: f64,
    /// Cone constant.
    n: f64,
    /// Mapping radius coefficient `a * F`.
    af: f64,
    /// Radius of the latitude-of-origin parallel.
    rho0: f64,
}

impl LambertConformal {
    /// Builds a secant Lambert Conformal Conic projection from its
    /// defining parameters, all angles in degrees.
    #[must_use]
    pub fn new(
        lat0_deg: f64,
        lon0_deg: f64,
        lat1_deg: f64,
        lat2_deg: f64,
        x0: f64,
        y0: f64,
    ) -> Self {
        let to_rad = PI / 180.0;
        let lat0 = lat0_deg * to_rad;
        let lon0 = lon0_deg * to_rad;
        let lat1 = lat1_deg * to_rad;
        let lat2 = lat2_deg * to_rad;

        let f = 1.0 / GRS80_INV_F;
        let e = (2.0 * f - f * f).sqrt();

        let m1 = parallel_radius_factor(lat1, e);
        let m2 = parallel_radius_factor(lat2, e);
        let t0 = conformal_parameter(lat0, e);
        let t1 = conformal_parameter(lat1, e);
        let t2 = conformal_parameter(lat2, e);

        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let af = GRS80_A * m1 / (n * t1.powf(n));
        let rho0 = af * t0.powf(n);

        Self {
            lon0,
            x0,
            y0,
            e,
            n,
            af,
            rho0,
        }
    }

    /// The RGF93 / Lambert-93 projection (EPSG:2154).
    #[must_use]
    pub fn lambert93() -> Self {
        Self::new(46.5, 3.0, 44.0, 49.0, 700_000.0, 6_600_000.0)
    }

    /// Projects (longitude, latitude) in degrees to (easting, northing)
    /// in meters.
    #[must_use]
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let lon = lon_deg * to_rad;

        let t = conformal_parameter(lat, self.e);
        let rho = self.af * t.powf(self.n);
        let theta = self.n * normalize_longitude(lon - self.lon0);

        let x = self.x0 + rho * theta.sin();
        let y = self.y0 + self.rho0 - rho * theta.cos();
        (x, y)
    }

    /// Inverse-projects (easting, northing) in meters to (longitude,
    /// latitude) in degrees.
    #[must_use]
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let dx = x - self.x0;
        let dy = self.rho0 - (y - self.y0);

        let mut rho = dx.hypot(dy);
        if self.n < 0.0 {
            rho = -rho;
        }
        let theta = dx.atan2(dy);
        let t = (rho / self.af).powf(1.0 / self.n);

        let lon = self.lon0 + theta / self.n;

        // Fixed-point iteration for the ellipsoidal latitude.
        let mut lat = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..INVERSE_ITERATIONS {
            let es = self.e * lat.sin();
            lat = FRAC_PI_2
                - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
        }

        (lon * to_deg, lat * to_deg)
    }
}

/// `m(φ) = cos φ / sqrt(1 − e² sin² φ)` — radius factor of a parallel.
fn parallel_radius_factor(lat: f64, e: f64) -> f64 {
    lat.cos() / (1.0 - e * e * lat.sin() * lat.sin()).sqrt()
}

/// `t(φ)` — the isometric-latitude parameter of the conformal mapping.
fn conformal_parameter(lat: f64, e: f64) -> f64 {
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Normalizes a longitude difference to `[-π, π]`.
fn normalize_longitude(mut dlon: f64) -> f64 {
    while dlon > PI {
        dlon -= 2.0 * PI;
    }
    while dlon < -PI {
        dlon += 2.0 * PI;
    }
    dlon
}
