use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rb_core::model::Rgb;

/// Random colors for the mutate command. Seeding with the same value gives
/// every backend the same color sequence, so mutation cost is compared on
/// identical work.
#[derive(Debug, Clone)]
pub struct Palette {
    rng: StdRng,
}

impl Palette {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn color(&mut self) -> Rgb {
        Rgb::new(self.rng.random_range(0..=0xFF_FFFF))
    }
}
