use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use hyperorbit_engine::gpu::GpuContext;
use hyperorbit_engine::status::TracingStatus;
use hyperorbit_engine::{ComputeDevice, CpuDevice, Renderer, Settings, WgpuDevice};
use hyperorbit_viewer::cli::{Args, Backend};
use hyperorbit_viewer::{export, logging};
use tracing::{error, info};

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logging::init(args.log_level.as_deref()) {
        eprintln!("hyperorbit: {e}");
        return ExitCode::FAILURE;
    }
    info!(version = hyperorbit_engine::version(), backend = ?args.backend, "hyperorbit");
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let settings = args.settings()?;
    let config = args.engine_config();
    match args.backend {
        Backend::Cpu => drive(Renderer::new(CpuDevice::default(), config), &settings, args),
        Backend::Gpu => {
            let ctx = pollster::block_on(GpuContext::new())?;
            let info = ctx.adapter.get_info();
            info!(adapter = %info.name, backend = ?info.backend, "GPU ready");
            let device = WgpuDevice::from_context(ctx);
            drive(Renderer::new(device, config), &settings, args)
        }
    }
}

fn drive<D: ComputeDevice>(
    mut renderer: Renderer<D>,
    settings: &Settings,
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    renderer.initialize(settings, &mut TracingStatus::default())?;
    let visible: Vec<usize> = (0..settings.windows.len()).collect();
    for frame in 0..args.frames {
        let report = renderer.render_frame(settings, &visible)?;
        let dispatches = report.dispatches();
        info!(frame, dispatches, "frame done");
        if dispatches == 0 && !renderer.resize_pending() {
            info!(frame, "every window converged");
            break;
        }
    }

    let extent = settings.extent();
    for &index in &visible {
        let Some(window) = settings.window(index) else { continue };
        let texels = renderer.read_surface(index)?;
        let name = export::window_file_name(index, window.space, window.render_mode);
        export::write_png(&args.out.join(name), &texels, extent)?;
    }
    renderer.destroy();
    Ok(())
}
