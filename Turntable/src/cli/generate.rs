//! CLI command for turntable GIF generation

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::cli::Cli;
use crate::cli::progress::{
    CUBE, DISK, LOOKING_GLASS, PICTURE, percent_bar, print_done, print_step,
};
use crate::config::{TurntableConfig, validate_scale};
use crate::loader::FileSelection;
use crate::pipeline::{GenerationPhase, Pipeline, PreviewContext};
use crate::render::SoftwareRenderer;

/// Load, render and write the GIF described by `cli`.
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = match &cli.config {
        Some(path) => TurntableConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => TurntableConfig::default(),
    };
    let (options, scale) = cli.resolve(config);
    options.validate()?;
    validate_scale(scale)?;
    let steps = if cli.preview.is_some() { 4 } else { 3 };
    let mut step = 0;
    let mut announce = |emoji, msg: &str| {
        step += 1;
        if !cli.quiet {
            print_step(step, steps, emoji, msg);
        }
    };

    announce(LOOKING_GLASS, &format!("Loading {}...", cli.model.display()));
    let selection = if cli.siblings {
        FileSelection::with_siblings(&cli.model)?
    } else {
        FileSelection::from_paths(&cli.model, &cli.with)?
    };

    let mut pipeline = Pipeline::new(PreviewContext::new(options.background, 1.0));
    pipeline
        .load(&selection)
        .with_context(|| format!("Failed to load {}", cli.model.display()))?;
    pipeline.preview_mut().set_user_scale(scale)?;
    for warning in pipeline.preview().warnings() {
        if !cli.quiet {
            println!("  {warning}");
        }
    }

    if let Some(path) = &cli.preview {
        announce(CUBE, &format!("Rendering preview to {}...", path.display()));
        let mut renderer =
            SoftwareRenderer::new(options.image_size, options.image_size, options.antialias)?;
        let frame = pipeline.preview().render_preview(&mut renderer)?;
        write_atomically(path, &frame.png)?;
    }

    announce(
        PICTURE,
        &format!(
            "Rendering {} frames at {}x{}...",
            options.frame_count, options.image_size, options.image_size
        ),
    );
    let pb = percent_bar(cli.quiet);
    let output = pipeline.generate(&options, &mut |progress| {
        pb.set_position(u64::from(progress.percent));
        match progress.phase {
            GenerationPhase::Rendering => {
                pb.set_message(format!("Frame {}/{}", progress.frame, progress.frame_count));
            }
            GenerationPhase::Encoding => pb.set_message("Encoding"),
        }
    });
    let output = match output {
        Ok(output) => {
            pb.finish_with_message("done");
            output
        }
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
    };

    announce(DISK, &format!("Writing {}...", cli.output.display()));
    write_atomically(&cli.output, &output.blob.bytes)?;
    tracing::info!(
        "Wrote {} ({} frames, {} bytes)",
        cli.output.display(),
        output.frames.len(),
        output.blob.len()
    );

    if !cli.quiet {
        print_done(started.elapsed());
    }
    Ok(())
}

/// Write `bytes` next to `path` and move them into place, so a failed run
/// never leaves a partial file behind.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use clap::Parser;

    const CUBE_OBJ: &str = "\
v -1 -1 -1
v 1 -1 -1
v 1 1 -1
v -1 1 -1
f 1 2 3 4
";

    /// Run the command with `flags` against a cube next to a preview path.
    fn run_with(flags: &[&str]) -> (anyhow::Result<()>, bool) {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("cube.obj");
        std::fs::write(&model, CUBE_OBJ).unwrap();
        let preview = dir.path().join("preview.png");

        let mut args = vec![
            "turntable".to_string(),
            format!("--model={}", model.display()),
            format!("--output={}", dir.path().join("cube.gif").display()),
            format!("--preview={}", preview.display()),
            "--quiet".to_string(),
        ];
        args.extend(flags.iter().map(ToString::to_string));
        let cli = Cli::try_parse_from(args).unwrap();

        let result = execute(&cli);
        (result, preview.exists())
    }

    fn is_invalid_options(result: &anyhow::Result<()>) -> bool {
        matches!(
            result.as_ref().map_err(|e| e.downcast_ref::<Error>()),
            Err(Some(Error::InvalidOptions(_)))
        )
    }

    #[test]
    fn test_zero_frames_rejected_before_preview() {
        let (result, preview_written) = run_with(&["--frames=0", "--size=16"]);
        assert!(is_invalid_options(&result));
        assert!(!preview_written);
        let message = format!("{:#}", result.unwrap_err());
        assert_eq!(message, "invalid options: frame count must be at least 1");
    }

    #[test]
    fn test_zero_size_is_invalid_options() {
        let (result, preview_written) = run_with(&["--size=0"]);
        assert!(is_invalid_options(&result));
        assert!(!preview_written);
    }

    #[test]
    fn test_bad_scale_rejected_before_preview() {
        let (result, preview_written) = run_with(&["--size=16", "--scale=-1"]);
        assert!(is_invalid_options(&result));
        assert!(!preview_written);
    }

    #[test]
    fn test_valid_run_writes_preview() {
        let (result, preview_written) = run_with(&["--frames=2", "--size=16"]);
        result.unwrap();
        assert!(preview_written);
    }

    #[test]
    fn test_write_atomically_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");
        std::fs::write(&path, b"old").unwrap();

        write_atomically(&path, b"GIF89a").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomically_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.gif");
        assert!(write_atomically(&path, b"GIF89a").is_err());
        assert!(!path.exists());
    }
}
