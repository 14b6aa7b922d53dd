#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use std::{error::Error, sync::{Arc, Mutex}};
use mimalloc::MiMalloc;
use house_predictor::{
    config::{self, Config},
    controller::{SubmissionController, Waker},
    form::FormState,
    initialization::App,
    prediction::HttpTransport,
    ui::{PredictorApp, PredictorAppConfig},
};
use winit::event_loop::{ControlFlow, EventLoop};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        if let Err(e) = pollster::block_on(run()) {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let event_loop = EventLoop::new()?;
    let proxy = Mutex::new(event_loop.create_proxy());

    event_loop.set_control_flow(ControlFlow::Wait);

    let config = config::get_check_and_set_config(&config::default_config_path());
    let stale_policy = config.stale_policy();
    let Config { api_url, window_size_startup, start_in_fullscreen, .. } = config;

    let transport = HttpTransport::new(&api_url)?;
    let endpoint = transport.endpoint().to_string();
    log::info!("predictions will be requested from {} ({:?})", endpoint, stale_policy);

    // lets the prediction workers make the UI refresh
    let waker: Waker = Arc::new(move || {
        if let Ok(proxy) = proxy.lock() {
            let _ = proxy.send_event(());
        }
    });

    let setup_config = PredictorAppConfig {
        controller: SubmissionController::new(Arc::new(transport), stale_policy, waker),
        form: FormState::new(),
        start_in_fullscreen,
        endpoint,
    };

    let mut app = App::new(PredictorApp::new(setup_config), window_size_startup);

    event_loop.run_app(&mut app)?;
    Ok(())
}
