use petalsonic_al::device::SoftDevice;
use petalsonic_al::source::MemorySource;
use petalsonic_al::{PetalSonicFactory, PetalSonicFactoryDesc, Vec3};
use std::rc::Rc;
use std::time::Duration;

/// Plays one tone buffer through two voices that sweep around the listener
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let desc = PetalSonicFactoryDesc::new().sample_rate(48000).block_size(1024);
    let factory = PetalSonicFactory::with_desc(Rc::new(SoftDevice::cpal()), true, desc)?;
    factory.set_listener_pos(Vec3::ZERO, -Vec3::Z, Vec3::Y)?;

    // One second of a 440Hz sine wave
    let sample_rate = 44100;
    let frequency = 440.0;
    let samples: Vec<f32> = (0..sample_rate)
        .map(|i| {
            let phase = i as f32 * frequency / sample_rate as f32;
            (phase * std::f32::consts::TAU).sin() * 0.3
        })
        .collect();
    let mut source = MemorySource::from_f32_samples(&samples, sample_rate, 1);

    let left = factory.load_source(&mut source)?;
    let right = left.try_clone()?;
    log::info!("Two voices sharing one buffer ({} owners)", left.ref_count());

    right.set_pitch(1.5)?;
    right.set_volume(0.6)?;
    for sound in [&left, &right] {
        sound.set_range(1.0, 20.0, 1.0)?;
        sound.set_repeat(true);
        sound.play()?;
    }

    let steps = 60;
    for step in 0..steps {
        let angle = step as f32 / steps as f32 * std::f32::consts::TAU;
        left.set_pos(Vec3::new(angle.cos() * 3.0, 0.0, angle.sin() * 3.0))?;
        right.set_pos(Vec3::new(-angle.cos() * 3.0, 0.0, -angle.sin() * 3.0))?;
        std::thread::sleep(Duration::from_millis(50));
    }

    right.pause()?;
    std::thread::sleep(Duration::from_millis(500));
    left.stop()?;
    log::info!("Still playing: left={}, right={}", left.is_playing(), right.is_playing());

    Ok(())
}
