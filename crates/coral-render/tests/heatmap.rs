use std::collections::HashMap;

use coral_core::{CoralConfig, Simulation};
use coral_render::{RenderSettings, render_image};

#[test]
fn finished_run_renders_one_color_per_frame() {
    let mut sim = Simulation::new(CoralConfig {
        world_size: 48,
        num_species: 4,
        max_iterations: 20_000,
        rng_seed: Some(424_242),
        ..CoralConfig::default()
    })
    .expect("simulation");
    let _ = sim.run();
    let total = sim.total_iterations();

    let image = render_image(sim.grid(), total, RenderSettings::new(12.0, 99)).expect("render");
    assert_eq!(image.dimensions(), (48, 48));

    // Cells sharing a last-mutation frame share a color.
    let mut by_frame: HashMap<u32, [u8; 3]> = HashMap::new();
    for (index, &frame) in sim.grid().last_mutation().iter().enumerate() {
        assert!(frame <= total);
        let x = (index % 48) as u32;
        let y = (index / 48) as u32;
        let color = image.get_pixel(x, y).0;
        let expected = *by_frame.entry(frame).or_insert(color);
        assert_eq!(color, expected, "frame {frame} rendered inconsistently");
    }

    let again = render_image(sim.grid(), total, RenderSettings::new(12.0, 99)).expect("render");
    assert_eq!(image, again);
}
