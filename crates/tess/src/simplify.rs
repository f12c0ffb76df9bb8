use glam::Vec3;
use morpho::Morphology;

/// Distance/radius collapse: drop interior section samples closer to the
/// last kept sample than the larger of the two radii. First and last
/// samples always survive so section endpoints stay put.
pub fn simplify(morphology: &mut Morphology) {
    let mut removed = 0usize;
    for neurite in &mut morphology.neurites {
        for section in &mut neurite.sections {
            if section.samples.len() <= 2 {
                continue;
            }
            let before = section.samples.len();
            let last_index = before - 1;
            let mut kept = vec![section.samples[0]];
            for (index, sample) in section.samples.iter().enumerate().skip(1) {
                let prev = kept[kept.len() - 1];
                let threshold = prev.radius.max(sample.radius);
                let distance = (sample.position - prev.position).length();
                if index == last_index || distance >= threshold {
                    kept.push(*sample);
                }
            }
            removed += before - kept.len();
            section.samples = kept;
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "Simplified morphology samples");
    }
}

/// Soma adaptation: scale the soma about its center by `alpha_radius`, then
/// pull each neurite's first sample onto the scaled soma surface. Entries in
/// `alpha_neurites` scale the pull distance per neurite; missing entries
/// default to 1.
pub fn adapt_soma(morphology: &mut Morphology, alpha_radius: f32, alpha_neurites: &[f32]) {
    if morphology.soma.is_empty() {
        return;
    }

    let center = morphology.soma.center();
    let alpha_radius = alpha_radius.max(0.01);
    if (alpha_radius - 1.0).abs() > f32::EPSILON {
        for sample in &mut morphology.soma.samples {
            sample.position = center + (sample.position - center) * alpha_radius;
            sample.radius *= alpha_radius;
        }
    }
    let radius = morphology.soma.mean_radius();

    for (index, neurite) in morphology.neurites.iter_mut().enumerate() {
        let alpha = alpha_neurites.get(index).copied().unwrap_or(1.0).max(0.01);
        let Some(first) = neurite
            .sections
            .first_mut()
            .and_then(|section| section.samples.first_mut())
        else {
            continue;
        };
        let direction = (first.position - center).normalize_or_zero();
        if direction == Vec3::ZERO {
            continue;
        }
        first.position = center + direction * radius * alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpho::{MorphologyId, Neurite, NeuriteKind, Sample, Section, Soma};

    fn sample(x: f32, y: f32, z: f32, radius: f32) -> Sample {
        Sample {
            position: Vec3::new(x, y, z),
            radius,
        }
    }

    fn straight_neurite(samples: Vec<Sample>) -> Neurite {
        Neurite {
            kind: NeuriteKind::BasalDendrite,
            sections: vec![Section {
                samples,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn ball_soma(radius: f32) -> Soma {
        Soma {
            samples: vec![sample(0.0, 0.0, 0.0, radius)],
        }
    }

    #[test]
    fn simplify_collapses_dense_runs() {
        let samples = vec![
            sample(0.0, 0.0, 0.0, 1.0),
            sample(0.0, 0.2, 0.0, 1.0),
            sample(0.0, 0.4, 0.0, 1.0),
            sample(0.0, 3.0, 0.0, 1.0),
            sample(0.0, 6.0, 0.0, 1.0),
        ];
        let mut morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(1.0),
            vec![straight_neurite(samples)],
        );
        simplify(&mut morphology);

        let kept = &morphology.neurites[0].sections[0].samples;
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].position, Vec3::ZERO);
        assert_eq!(kept[1].position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(kept[2].position, Vec3::new(0.0, 6.0, 0.0));
    }

    #[test]
    fn simplify_keeps_endpoints_even_when_close() {
        let samples = vec![
            sample(0.0, 0.0, 0.0, 1.0),
            sample(0.0, 5.0, 0.0, 1.0),
            sample(0.0, 5.1, 0.0, 1.0),
        ];
        let mut morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(1.0),
            vec![straight_neurite(samples)],
        );
        simplify(&mut morphology);

        let kept = &morphology.neurites[0].sections[0].samples;
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].position, Vec3::new(0.0, 5.1, 0.0));
    }

    #[test]
    fn adapt_soma_pulls_first_sample_to_surface() {
        let mut morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(2.0),
            vec![straight_neurite(vec![
                sample(0.0, 10.0, 0.0, 0.5),
                sample(0.0, 20.0, 0.0, 0.5),
            ])],
        );
        adapt_soma(&mut morphology, 1.0, &[]);

        let first = morphology.neurites[0].sections[0].samples[0];
        assert!((first.position - Vec3::new(0.0, 2.0, 0.0)).length() < 1.0e-5);
    }

    #[test]
    fn alpha_factors_scale_soma_and_pull() {
        let mut morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(2.0),
            vec![straight_neurite(vec![
                sample(0.0, 10.0, 0.0, 0.5),
                sample(0.0, 20.0, 0.0, 0.5),
            ])],
        );
        adapt_soma(&mut morphology, 0.5, &[2.0]);

        assert!((morphology.soma.mean_radius() - 1.0).abs() < 1.0e-5);
        let first = morphology.neurites[0].sections[0].samples[0];
        // Pull distance = scaled radius (1.0) times the neurite factor.
        assert!((first.position - Vec3::new(0.0, 2.0, 0.0)).length() < 1.0e-5);
    }

    #[test]
    fn soma_less_morphology_is_left_alone() {
        let mut morphology = Morphology::new(
            MorphologyId(0),
            Soma::default(),
            vec![straight_neurite(vec![
                sample(0.0, 10.0, 0.0, 0.5),
                sample(0.0, 20.0, 0.0, 0.5),
            ])],
        );
        adapt_soma(&mut morphology, 1.0, &[]);
        assert_eq!(
            morphology.neurites[0].sections[0].samples[0].position,
            Vec3::new(0.0, 10.0, 0.0)
        );
    }
}
