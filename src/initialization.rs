use egui::Context;
use egui_wgpu::wgpu::{StoreOp, SurfaceError};
use egui_wgpu::{wgpu, Renderer, RendererOptions, ScreenDescriptor};
use egui_winit::{ActionRequested, State};
use crate::ui::PredictorApp;
use wgpu::{Color, ExperimentalFeatures, LoadOp};
use winit::event::WindowEvent;
use winit::window::{Window, WindowId};
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalPosition, LogicalSize, PhysicalSize};
use winit::event_loop::ActiveEventLoop;

/// Idle time after which continuous redraws stop until the next input or wake-up.
const SLEEP_AFTER: Duration = Duration::from_secs(10);

pub struct AppState<'a> {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub surface: wgpu::Surface<'a>,
    pub scale_factor: f32,
    pub egui_winit_state: State,
    pub egui_wgpu_renderer: Renderer,
}

impl AppState<'_> {
    async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        window: &Window,
        width: u32,
        height: u32,
    ) -> Result<Self, Box<dyn Error>> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: Default::default(),
                    memory_hints: Default::default(),
                    trace: Default::default(),
                    experimental_features: ExperimentalFeatures::disabled(),
                }
            )
            .await?;

        let swapchain_capabilities = surface.get_capabilities(&adapter);

        let swapchain_format = swapchain_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| *f == wgpu::TextureFormat::Bgra8Unorm)
            .or_else(|| swapchain_capabilities.formats.first().copied())
            .ok_or("surface reports no usable texture format")?;

        let alpha_mode = swapchain_capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: swapchain_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };

        surface.configure(&device, &surface_config);

        let max_texture_side = device.limits().max_texture_dimension_2d as usize;
        log::debug!("surface format {:?}, max texture side {}", swapchain_format, max_texture_side);

        let egui_winit_state = egui_winit::State::new(
            Context::default(),
            egui::viewport::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(max_texture_side),
        );

        let renderer_options = RendererOptions {
            msaa_samples: 1,
            depth_stencil_format: None,
            dithering: false,
            predictable_texture_filtering: true,
        };

        let egui_wgpu_renderer = Renderer::new(&device, surface_config.format, renderer_options);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            scale_factor: window.scale_factor() as f32,
            egui_wgpu_renderer,
            egui_winit_state,
        })
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn context(&self) -> &Context {
        self.egui_winit_state.egui_ctx()
    }
}

pub struct App<'a> {
    instance: wgpu::Instance,
    state: Option<AppState<'a>>,
    window: Option<Arc<Window>>,
    predictor: PredictorApp,
    window_is_focused: bool,
    cursor_inside_window: bool,
    last_active: Option<Instant>,
    in_sleep: bool,
    window_size_startup: [f32; 2],
}

impl<'a> App<'a> {
    pub fn new(predictor: PredictorApp, window_size_startup: [f32; 2]) -> Self {
        let instance = egui_wgpu::wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        Self {
            instance,
            state: None,
            window: None,
            predictor,
            window_is_focused: false,
            cursor_inside_window: false,
            last_active: Some(Instant::now()),
            in_sleep: false,
            window_size_startup,
        }
    }

    async fn set_window(&mut self, window: Window) -> Result<(), Box<dyn Error>> {
        let window = Arc::new(window);
        let initial_width = self.window_size_startup[0] as u32;
        let initial_height = self.window_size_startup[1] as u32;

        let _ = window.request_inner_size(PhysicalSize::new(initial_width, initial_height));

        let surface = self.instance.create_surface(window.clone())?;

        let state = AppState::new(&self.instance, surface, &window, initial_width, initial_height).await?;

        self.window.get_or_insert(window);

        self.predictor.init_with_context(state.context());

        self.state.get_or_insert(state);
        Ok(())
    }

    fn wake(&mut self) {
        self.last_active = None;
        self.in_sleep = false;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn handle_resized(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            if let Some(state) = self.state.as_mut() {
                state.resize_surface(width, height);
            }
        }
    }

    fn handle_redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else { return };

        if window.is_minimized().unwrap_or(false) {
            return;
        }

        let Some(state) = self.state.as_mut() else { return };

        let raw_input = state.egui_winit_state.take_egui_input(&window);
        // no input, no pending repaint, not focused: count towards sleep
        if raw_input.events.is_empty() && !state.context().has_requested_repaint() && !self.window_is_focused && !self.cursor_inside_window {
            match self.last_active {
                Some(time) => {
                    if time.elapsed() > SLEEP_AFTER {
                        self.in_sleep = true;
                    }
                }
                None => self.last_active = Some(Instant::now()),
            }
        } else {
            self.last_active = Some(Instant::now());
        }

        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [state.surface_config.width, state.surface_config.height],
            pixels_per_point: state.scale_factor,
        };

        let surface_texture = match state.surface.get_current_texture() {
            Ok(tex) => tex,
            Err(SurfaceError::Outdated | SurfaceError::Lost) => {
                state.surface.configure(&state.device, &state.surface_config);
                window.request_redraw();
                return;
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("surface timed out");
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory, exiting");
                event_loop.exit();
                return;
            }
            Err(e) => {
                log::warn!("could not acquire surface texture: {}", e);
                return;
            }
        };

        let surface_view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = state.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        state.context().begin_pass(raw_input);

        let is_fullscreen = window.fullscreen().is_some();
        let info = state.egui_winit_state.egui_input_mut().viewports.entry(egui::viewport::ViewportId::ROOT).or_default();
        info.fullscreen = Some(is_fullscreen);

        self.predictor.ui(state.context());

        let full_output = state.context().end_pass();

        let mut actions_requested: Vec<ActionRequested> = vec![];
        let egui_ctx = state.context().clone();

        for (id, output) in full_output.viewport_output.into_iter() {
            if let Some(viewport_info) = state.egui_winit_state.egui_input_mut().viewports.get_mut(&id) {
                egui_winit::process_viewport_commands(
                    &egui_ctx,
                    viewport_info,
                    output.commands,
                    &window,
                    &mut actions_requested,
                );
                if viewport_info.events.iter().any(|e| matches!(e, egui::ViewportEvent::Close)) {
                    event_loop.exit();
                }
            }
        }

        state.egui_winit_state.handle_platform_output(&window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, egui_ctx.pixels_per_point());

        for (id, delta) in &full_output.textures_delta.set {
            state.egui_wgpu_renderer.update_texture(&state.device, &state.queue, *id, delta);
        }

        state.egui_wgpu_renderer.update_buffers(&state.device, &state.queue, &mut encoder, &paint_jobs, &screen_descriptor);

        {
            let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("predictor main render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: egui_wgpu::wgpu::Operations {
                        load: LoadOp::Clear(Color { r: 0.97, g: 0.98, b: 1.0, a: 1.0 }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            state.egui_wgpu_renderer.render(&mut rpass.forget_lifetime(), &paint_jobs, &screen_descriptor);
        }

        state.queue.submit(Some(encoder.finish()));
        surface_texture.present();

        for tex_id in full_output.textures_delta.free {
            state.egui_wgpu_renderer.free_texture(&tex_id);
        }
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_size = LogicalSize::new(self.window_size_startup[0], self.window_size_startup[1]);
        let window_title = format!("California House Price Predictor    -   Ver.{}", env!("BUILD_DATE"));

        let mut attributes = Window::default_attributes()
            .with_title(window_title)
            .with_inner_size(window_size)
            .with_min_inner_size(LogicalSize::new(640.0, 480.0));

        if let Some(monitor) = event_loop.primary_monitor().or_else(|| event_loop.available_monitors().next()) {
            let monitor_position = monitor.position();
            let monitor_size = monitor.size();
            attributes = attributes.with_position(LogicalPosition::new(
                monitor_position.x + (monitor_size.width as i32 - window_size.width as i32) / 2,
                monitor_position.y + (monitor_size.height as i32 - window_size.height as i32) / 2,
            ));
        }

        let window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(e) => {
                log::error!("failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = pollster::block_on(self.set_window(window)) {
            log::error!("failed to initialise renderer: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        if let (Some(state), Some(window)) = (self.state.as_mut(), self.window.as_ref()) {
            // let egui process the event first
            let resp = state.egui_winit_state.on_window_event(window, &event);

            if resp.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::debug!("close requested; stopping");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resized(new_size.width, new_size.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, mut inner_size_writer } => {
                let Some(window) = self.window.as_ref() else { return };
                let physical_size = window.inner_size();

                if let Some(state) = self.state.as_mut() {
                    state.scale_factor = scale_factor as f32;
                    state.resize_surface(physical_size.width, physical_size.height);
                    state.context().set_pixels_per_point(state.scale_factor);
                }

                let _ = inner_size_writer.request_inner_size(physical_size);
            }
            WindowEvent::Focused(focused) => {
                self.window_is_focused = focused;
                self.cursor_inside_window = focused;
                self.handle_redraw(event_loop);
                self.wake();
            }
            WindowEvent::RedrawRequested => {
                self.handle_redraw(event_loop);

                if !self.in_sleep {
                    if let Some(window) = self.window.as_ref() {
                        window.request_redraw();
                    }
                }
            }
            WindowEvent::CursorEntered { .. } | WindowEvent::CursorMoved { .. } => {
                self.cursor_inside_window = true;
                self.wake();
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor_inside_window = false;
                self.wake();
            }
            _ => (),
        }
    }

    // prediction workers wake the loop through the proxy once an outcome lands
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, _event: ()) {
        self.wake();
    }
}
