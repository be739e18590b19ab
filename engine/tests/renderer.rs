use std::path::Path;

use hyperorbit_algebra::{Number, NumberSystem};
use hyperorbit_engine::config::EngineConfig;
use hyperorbit_engine::cpu::{CpuDevice, CpuDeviceConfig};
use hyperorbit_engine::device::ComputeDevice;
use hyperorbit_engine::error::{BuildError, EngineError};
use hyperorbit_engine::layout::WORK_CELL_SIZE;
use hyperorbit_engine::options::{Dimensions, RenderMode, Space};
use hyperorbit_engine::program::BUILD_SUCCESS_MARKER;
use hyperorbit_engine::renderer::{Renderer, RendererState};
use hyperorbit_engine::settings::{Settings, ViewWindowSettings};
use hyperorbit_engine::status::StatusLog;

fn config(dir: &Path) -> EngineConfig {
    EngineConfig { build_log_path: dir.join("kernel_build.log"), ..EngineConfig::default() }
}

fn escape_settings(resolution: u32, modifier: f32, per_frame: u32) -> Settings {
    let mut window = ViewWindowSettings::new(Space::Phase, RenderMode::Escape);
    window.view.zoom = 1.0;
    window.iteration_modifier = modifier;
    window.iterations_per_frame = per_frame;
    Settings { resolution, ..Settings::single(window) }
}

fn ready(dir: &Path, settings: &Settings) -> Renderer<CpuDevice> {
    let mut renderer = Renderer::new(CpuDevice::default(), config(dir));
    renderer.initialize(settings, &mut ()).unwrap();
    renderer
}

fn run(renderer: &mut Renderer<CpuDevice>, settings: &Settings, frames: usize) -> Vec<usize> {
    let visible: Vec<usize> = (0..settings.windows.len()).collect();
    (0..frames).map(|_| renderer.render_frame(settings, &visible).unwrap().dispatches()).collect()
}

#[test]
fn escape_window_converges_in_five_frames() {
    let dir = tempfile::tempdir().unwrap();
    let settings = escape_settings(64, 50.0, 10);
    let mut renderer = ready(dir.path(), &settings);

    let first = renderer.render_frame(&settings, &[0]).unwrap();
    let record = first.windows[0].dispatch.unwrap();
    assert_eq!((record.last_iteration, record.max_iteration, record.global_max), (0, 10, 50));

    assert_eq!(run(&mut renderer, &settings, 6), [1, 1, 1, 1, 0, 0]);
    assert_eq!(renderer.executor(0).unwrap().iteration(), 50);
    assert_eq!(renderer.context().device.stats().dispatches, 5);
}

#[test]
fn split_dispatches_match_a_single_one() {
    let dir = tempfile::tempdir().unwrap();
    let whole = escape_settings(32, 50.0, 50);
    let split = escape_settings(32, 50.0, 10);

    let mut a = ready(dir.path(), &whole);
    assert_eq!(run(&mut a, &whole, 2), [1, 0]);
    let mut b = ready(dir.path(), &split);
    assert_eq!(run(&mut b, &split, 6), [1, 1, 1, 1, 1, 0]);

    assert_eq!(a.read_surface(0).unwrap(), b.read_surface(0).unwrap());
    let cells = |r: &Renderer<CpuDevice>| {
        let ctx = r.context();
        let chunk = ctx.programs.buffer().unwrap().chunks()[0];
        ctx.device.chunk_cells(chunk).unwrap().to_vec()
    };
    assert_eq!(cells(&a), cells(&b));
}

#[test]
fn view_and_parameter_changes_restart_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = escape_settings(16, 50.0, 10);
    let mut renderer = ready(dir.path(), &settings);
    run(&mut renderer, &settings, 2);
    assert_eq!(renderer.executor(0).unwrap().iteration(), 20);

    settings.windows[0].view.zoom_by(0.5);
    let report = renderer.render_frame(&settings, &[0]).unwrap();
    let record = report.windows[0].dispatch.unwrap();
    assert_eq!((record.last_iteration, record.max_iteration), (0, 10));
    assert_eq!(record.global_max, 62);

    run(&mut renderer, &settings, 1);
    settings.parameter = Number::from_components(&[-0.8, 0.156]);
    let record = renderer.render_frame(&settings, &[0]).unwrap().windows[0].dispatch.unwrap();
    assert_eq!(record.last_iteration, 0);
}

#[test]
fn number_system_change_switches_kernels() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = escape_settings(16, 50.0, 10);
    let mut renderer = ready(dir.path(), &settings);
    run(&mut renderer, &settings, 1);

    settings.set_number_system(NumberSystem::Quaternion);
    settings.windows[0].view.mapping = [1, 3, 0];
    let record = renderer.render_frame(&settings, &[0]).unwrap().windows[0].dispatch.unwrap();
    assert_eq!(record.variant.system, NumberSystem::Quaternion);
    assert_eq!(record.last_iteration, 0);
}

#[test]
fn switching_to_volumes_reallocates_every_surface() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings { resolution: 8, ..Settings::default() };
    for window in &mut settings.windows {
        window.iterations_per_frame = 5;
    }
    let mut renderer = ready(dir.path(), &settings);
    run(&mut renderer, &settings, 2);

    settings.set_number_system(NumberSystem::Quaternion);
    settings.set_dimensions(Dimensions::Three);
    let report = renderer.render_frame(&settings, &[0, 1, 2, 3]).unwrap();
    assert_eq!(report.dispatches(), 4);
    assert!(report.windows.iter().all(|w| w.dispatch.unwrap().last_iteration == 0));
    for index in 0..4 {
        assert_eq!(renderer.read_surface(index).unwrap().len(), 8 * 8 * 8);
    }
    let buffer = renderer.context().programs.buffer().unwrap();
    assert_eq!(buffer.items(), 512);
}

#[test]
fn windows_share_the_buffer_without_interfering() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings { resolution: 16, ..Settings::default() };
    let mut all = ready(dir.path(), &settings);
    run(&mut all, &settings, 3);

    for index in 0..settings.windows.len() {
        let alone = Settings { resolution: 16, ..Settings::single(settings.windows[index].clone()) };
        let mut single = ready(dir.path(), &alone);
        run(&mut single, &alone, 3);
        assert_eq!(
            all.read_surface(index).unwrap(),
            single.read_surface(0).unwrap(),
            "window {index} differs when sharing the buffer"
        );
    }
}

#[test]
fn orbit_windows_advance_one_iteration_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let window = ViewWindowSettings::new(Space::Dynamical, RenderMode::Translated);
    let settings = Settings { resolution: 16, ..Settings::single(window) };
    let mut renderer = ready(dir.path(), &settings);
    for frame in 0..3 {
        let record = renderer.render_frame(&settings, &[0]).unwrap().windows[0].dispatch.unwrap();
        assert_eq!((record.last_iteration, record.max_iteration), (frame, frame + 1));
        assert_eq!(record.global_max, u32::MAX);
    }
    assert!(renderer.read_surface(0).unwrap().iter().any(|t| *t != [0; 4]));
}

#[test]
fn hidden_windows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings { resolution: 8, ..Settings::default() };
    let mut renderer = ready(dir.path(), &settings);
    let report = renderer.render_frame(&settings, &[2]).unwrap();
    assert_eq!(report.windows.len(), 1);
    assert_eq!(report.windows[0].index, 2);
    assert_eq!(renderer.executor(0).unwrap().iteration(), 0);
}

#[test]
fn windows_can_be_added_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = escape_settings(8, 50.0, 10);
    let mut renderer = ready(dir.path(), &settings);
    run(&mut renderer, &settings, 1);

    settings.windows.push(ViewWindowSettings::new(Space::Dynamical, RenderMode::Escape));
    let report = renderer.render_frame(&settings, &[0, 1]).unwrap();
    assert_eq!(report.dispatches(), 2);
    let slots = |r: &Renderer<CpuDevice>| {
        r.context().programs.back_buffer().map(|b| b.slot_count()).unwrap_or(0)
    };
    assert_eq!(slots(&renderer), 2);
    assert_eq!(renderer.executors().len(), 2);

    settings.windows.pop();
    renderer.render_frame(&settings, &[0]).unwrap();
    assert_eq!(slots(&renderer), 1);
    assert_eq!(renderer.executors().len(), 1);
}

#[test]
fn build_failure_writes_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let settings = escape_settings(8, 50.0, 10);
    let mut device = CpuDevice::default();
    device.fail_next_build("kernel.wgsl:12: unknown identifier `zz`");
    let mut renderer = Renderer::new(device, config(dir.path()));
    let mut status = StatusLog::default();

    let err = renderer.initialize(&settings, &mut status).unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, EngineError::Build(BuildError::Failed { .. })));
    assert!(err.to_string().contains("see"), "{err}");
    let log = std::fs::read_to_string(dir.path().join("kernel_build.log")).unwrap();
    assert_eq!(log, "kernel.wgsl:12: unknown identifier `zz`");
    assert_eq!(renderer.state(), RendererState::Uninitialized);
    assert_eq!(status.lines[0], "Initializing renderer");

    renderer.initialize(&settings, &mut status).unwrap();
    assert_eq!(renderer.state(), RendererState::Ready);
    let log = std::fs::read_to_string(dir.path().join("kernel_build.log")).unwrap();
    assert_eq!(log, BUILD_SUCCESS_MARKER);
}

#[test]
fn allocation_failure_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let device = CpuDevice::new(CpuDeviceConfig {
        memory_budget_bytes: Some(2_000 * WORK_CELL_SIZE as u64),
        ..CpuDeviceConfig::default()
    });
    let mut settings = escape_settings(64, 50.0, 10);
    let mut renderer = Renderer::new(device, config(dir.path()));

    let err = renderer.initialize(&settings, &mut ()).unwrap_err();
    assert!(matches!(err, EngineError::Alloc(_)));
    assert_eq!(renderer.state(), RendererState::Ready);
    assert!(renderer.resize_pending());
    assert!(matches!(renderer.render_frame(&settings, &[0]), Err(EngineError::Alloc(_))));

    settings.resolution = 32;
    let report = renderer.render_frame(&settings, &[0]).unwrap();
    assert_eq!(report.dispatches(), 1);
    assert!(!renderer.resize_pending());
}

#[test]
fn lifecycle_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let settings = escape_settings(8, 50.0, 10);
    let mut renderer = Renderer::new(CpuDevice::default(), config(dir.path()));
    assert!(matches!(
        renderer.render_frame(&settings, &[0]),
        Err(EngineError::State { expected: RendererState::Ready, actual: RendererState::Uninitialized })
    ));
    renderer.initialize(&settings, &mut ()).unwrap();
    renderer.destroy();
    assert_eq!(renderer.state(), RendererState::Destroyed);
    assert_eq!(renderer.context().device.live_chunks(), 0);
    assert!(matches!(
        renderer.initialize(&settings, &mut ()),
        Err(EngineError::State { actual: RendererState::Destroyed, .. })
    ));
}

#[test]
fn device_failure_tears_the_renderer_down() {
    let dir = tempfile::tempdir().unwrap();
    let settings = escape_settings(8, 50.0, 10);
    let mut renderer = ready(dir.path(), &settings);
    run(&mut renderer, &settings, 1);

    let surface = renderer.executor(0).unwrap().surface().unwrap();
    renderer.context_mut().device.free_surface(surface);
    let err = renderer.render_frame(&settings, &[0]).unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(renderer.state(), RendererState::Destroyed);
}
