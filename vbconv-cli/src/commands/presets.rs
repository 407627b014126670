//! Implementation of the 'presets' subcommand.

use crate::output;

use vbconv_core::{AudioMode, Preset};

/// Lists every built-in preset with its settings.
pub fn run_presets() {
    output::print_section("PRESETS");
    for preset in Preset::ALL {
        println!();
        output::print_status(preset.name(), preset.description());
        if let Ok(settings) = preset.builder().build() {
            let audio = match settings.audio {
                AudioMode::Copy => "audio copy".to_string(),
                AudioMode::Aac { bitrate_kbps } => format!("AAC {bitrate_kbps}k"),
            };
            println!(
                "                 {} {}, {} {}, {}, {}, .{}",
                settings.codec,
                if settings.hardware { "GPU" } else { "CPU" },
                settings.rate_control,
                settings.quality,
                settings.resolution,
                audio,
                settings.container.extension()
            );
        }
    }
}
