use anyhow::{anyhow, bail, Context, Result};
use camsource::commands::init::CameraSummary;
use camsource::dialog::display_name;
use camsource::platform::lock_webcam;
use camsource::{
    init_logging, CamSourceConfig, CameraEnumerator, CreateCameraSourceDialog, DialogOutcome,
    DialogState, Host, MainUpdateQueue, ProbeWait, Resolution, ResolutionCache, WebcamRotation,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: camsource-cli <list|resolutions|test|create> [args] [--json]");
        std::process::exit(1);
    }

    let config = CamSourceConfig::load_layered(CamSourceConfig::default_path())
        .context("Failed to load configuration")?;
    config.validate().map_err(|e| anyhow!(e))?;

    let command = &args[1];
    match command.as_str() {
        "list" => cmd_list(&args, &config),
        "resolutions" => cmd_resolutions(&args, &config).await,
        "test" => cmd_test(&args, config).await,
        "create" => cmd_create(&args, config).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

/// Arguments shared by the commands that drive a camera
struct CameraArgs {
    position: usize,
    resolution: Option<Resolution>,
    name: Option<String>,
    rotation: WebcamRotation,
    json: bool,
}

fn parse_camera_args(args: &[String], usage: &str) -> Result<CameraArgs> {
    let mut position = None;
    let mut resolution = None;
    let mut name = None;
    let mut rotation = WebcamRotation::default();
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "--name" => {
                i += 1;
                name = Some(args.get(i).ok_or_else(|| anyhow!(usage.to_string()))?.clone());
            }
            "--rotation" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!(usage.to_string()))?;
                rotation = value.parse()?;
            }
            value => {
                if position.is_none() {
                    position = Some(value.parse().context("Camera index must be a number")?);
                } else if resolution.is_none() {
                    resolution = Some(value.parse()?);
                } else {
                    bail!("Unexpected argument: {}\n{}", value, usage);
                }
            }
        }
        i += 1;
    }

    Ok(CameraArgs {
        position: position.ok_or_else(|| anyhow!(usage.to_string()))?,
        resolution,
        name,
        rotation,
        json,
    })
}

fn cmd_list(args: &[String], config: &CamSourceConfig) -> Result<()> {
    let enumeration = CameraEnumerator::system(&config.discovery).enumerate();

    let mut cameras = Vec::with_capacity(enumeration.webcams.len());
    for webcam in &enumeration.webcams {
        let webcam = lock_webcam(webcam)?;
        let name = webcam.name();
        cameras.push(CameraSummary {
            index: webcam.index(),
            display_name: display_name(&name, config.dialog.visible_name_chars),
            name,
            driver: webcam.kind(),
        });
    }

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&cameras)?);
    } else if cameras.is_empty() {
        println!("No cameras detected.");
    } else {
        for (position, camera) in cameras.iter().enumerate() {
            println!(
                "{}: {} (index {}, {})",
                position,
                camera.name,
                camera.index,
                camera.driver.as_str()
            );
        }
    }
    Ok(())
}

async fn cmd_resolutions(args: &[String], config: &CamSourceConfig) -> Result<()> {
    let parsed = parse_camera_args(args, "Usage: camsource-cli resolutions <index> [--json]")?;
    let enumeration = CameraEnumerator::system(&config.discovery).enumerate();
    let webcam = enumeration
        .webcams
        .get(parsed.position)
        .cloned()
        .ok_or_else(|| anyhow!("No camera at position {}", parsed.position))?;
    let label = display_name(&lock_webcam(&webcam)?.name(), config.dialog.visible_name_chars);

    let cache = ResolutionCache::new(config.probing.workers);
    cache.schedule(&label, webcam, None);
    let resolutions = match cache
        .wait_for(&label, config.probing.resolution_timeout())
        .await
    {
        ProbeWait::Ready(list) => list,
        ProbeWait::TimedOut => bail!("Timed out probing resolutions of {}", label),
        ProbeWait::Unusable | ProbeWait::NotScheduled => {
            bail!("{} reported no resolutions", label)
        }
    };

    if parsed.json {
        println!("{}", serde_json::to_string(&resolutions)?);
    } else {
        for resolution in resolutions {
            println!("{}", resolution);
        }
    }
    Ok(())
}

/// Open a dialog on `parsed.position`, select the requested resolution and run the camera test
async fn run_test(
    parsed: &CameraArgs,
    config: CamSourceConfig,
    host: Host,
    main_update: &MainUpdateQueue,
) -> Result<CreateCameraSourceDialog> {
    let test_timeout = config.probing.test_timeout();
    let cache = ResolutionCache::new(config.probing.workers);
    let enumerator = CameraEnumerator::system(&config.discovery);

    let mut dialog = CreateCameraSourceDialog::open(host, cache, config, &enumerator);
    if dialog.state() == DialogState::NoWebcams {
        bail!("No cameras detected");
    }
    dialog.select_camera(parsed.position)?;
    dialog.wait_for_resolutions().await;
    if dialog.state() == DialogState::Unsupported {
        bail!("{}", dialog.view().status);
    }

    if let Some(wanted) = parsed.resolution {
        let position = dialog
            .dimensions()
            .iter()
            .position(|res| *res == wanted)
            .ok_or_else(|| anyhow!("Camera does not support {}", wanted))?;
        dialog.select_resolution(position)?;
    }
    dialog.set_rotation(parsed.rotation)?;
    if let Some(name) = &parsed.name {
        dialog.set_name(name)?;
    }

    dialog.press_action()?;
    if dialog.state() != DialogState::ClickedTest {
        bail!("Cannot test camera: source name '{}' is not usable", dialog.name());
    }

    main_update.run_pending();
    dialog.wait_for_probe(test_timeout).await;
    Ok(dialog)
}

async fn cmd_test(args: &[String], config: CamSourceConfig) -> Result<()> {
    let parsed = parse_camera_args(
        args,
        "Usage: camsource-cli test <index> [WxH] [--json]",
    )?;
    let (host, _registry, main_update) = Host::in_process();

    let dialog = run_test(&parsed, config, host, &main_update).await?;
    let view = dialog.view();

    if parsed.json {
        println!("{}", serde_json::to_string(&view)?);
    } else {
        println!("{}", view.status);
    }

    if dialog.state() != DialogState::TestSuccessful {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_create(args: &[String], config: CamSourceConfig) -> Result<()> {
    let parsed = parse_camera_args(
        args,
        "Usage: camsource-cli create <index> [WxH] [--name N] [--rotation R] [--json]",
    )?;
    let (host, registry, main_update) = Host::in_process();

    let mut dialog = run_test(&parsed, config, host, &main_update).await?;
    if dialog.state() != DialogState::TestSuccessful {
        bail!("{}", dialog.view().status);
    }

    dialog.press_action()?;
    main_update.run_pending();

    let request = match dialog.outcome() {
        DialogOutcome::Created(request) => request.clone(),
        _ => bail!("Camera source was not created"),
    };
    let source = registry
        .get(&request.name)
        .ok_or_else(|| anyhow!("Host rejected camera source {}", request.name))?;

    if parsed.json {
        println!("{}", serde_json::to_string(&registry.sources())?);
    } else {
        println!(
            "Created {}: {} at {} ({})",
            request.name,
            source.camera,
            source.resolution,
            source.rotation.display_name()
        );
    }
    Ok(())
}
