//! Background (field star) density at each observation.
//!
//! Field stars are uniform over the ROI, except along the boundary observable
//! (vsini), where measurement errors smear the lower edge: the uniform
//! density is multiplied by a Gaussian CDF of width `v0err * std_floor`, and
//! stars reported below threshold see the mass that ends up past the edge.
//! Computed once per catalog; it does not depend on any model parameters.

use statrs::function::erf::erf;

use crate::domain::{Availability, Catalog, ClusterConfig, Measurement};
use crate::error::AppError;

/// Background density for every star in the catalog.
pub fn background_densities(catalog: &Catalog, config: &ClusterConfig) -> Result<Vec<f64>, AppError> {
    catalog
        .stars
        .iter()
        .enumerate()
        .map(|(i, star)| {
            let boundary = config.boundary_axis();
            let value = boundary.and_then(|b| star.values.get(b).copied());
            background_density(star.availability(boundary), value, config)
                .map_err(|e| e.context(format!("star {i} ({})", star.id)))
        })
        .collect()
}

fn background_density(
    availability: Availability,
    boundary_value: Option<Measurement>,
    config: &ClusterConfig,
) -> Result<f64, AppError> {
    let volume = config.volume(None);
    let Some(b) = config.boundary_axis() else {
        return Ok(1.0 / volume);
    };
    let width = config.v0err * config.std_floor[b];

    match availability {
        Availability::Absent => Ok(1.0 / config.volume(Some(b))),
        Availability::BelowThreshold => Ok(width / ((2.0 * std::f64::consts::PI).sqrt() * volume)),
        Availability::Full => {
            let Some(v) = boundary_value.and_then(Measurement::value) else {
                return Err(AppError::invalid("Boundary observable has no value."));
            };
            Ok((1.0 + erf(v / (std::f64::consts::SQRT_2 * width))) / (2.0 * volume))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Star;
    use approx::assert_relative_eq;

    fn catalog(last: Vec<Measurement>) -> Catalog {
        Catalog {
            observables: vec!["mag".into(), "col".into(), "vsini".into()],
            stars: last
                .into_iter()
                .enumerate()
                .map(|(i, m)| Star {
                    id: format!("S{i}"),
                    values: vec![Measurement::Present(20.5), Measurement::Present(0.7), m],
                    errors: vec![0.02, 0.02, 20.0],
                })
                .collect(),
        }
    }

    #[test]
    fn each_boundary_status_uses_its_own_formula() {
        let cfg = ClusterConfig::default();
        let cat = catalog(vec![
            Measurement::Absent,
            Measurement::BelowThreshold,
            Measurement::Present(0.0),
            Measurement::Present(250.0),
        ]);
        let back = background_densities(&cat, &cfg).unwrap();
        let volume = 2.5 * 0.6 * 280.0;
        assert_relative_eq!(back[0], 1.0 / (2.5 * 0.6), max_relative = 1e-12);
        assert_relative_eq!(back[1], 50.0 / ((2.0 * std::f64::consts::PI).sqrt() * volume), max_relative = 1e-12);
        // erf(0) = 0: half the uniform density at the edge.
        assert_relative_eq!(back[2], 0.5 / volume, max_relative = 1e-12);
        // Far from the edge the density is uniform.
        assert_relative_eq!(back[3], 1.0 / volume, max_relative = 1e-6);
    }

    #[test]
    fn without_boundary_axis_background_is_uniform() {
        let cfg = ClusterConfig {
            norm: vec![true, true, true],
            ..ClusterConfig::default()
        };
        let cat = catalog(vec![Measurement::Present(100.0)]);
        let back = background_densities(&cat, &cfg).unwrap();
        assert_relative_eq!(back[0], 1.0 / cfg.volume(None), max_relative = 1e-12);
    }
}
