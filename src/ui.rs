use egui::{self, Button, Color32, ComboBox, Context, CornerRadius, Key, Margin, RichText, Stroke, Ui, ViewportCommand, vec2};

use crate::{
    controller::{RenderState, SubmissionController, SubmissionState},
    form::{FieldName, FieldSpec, FormState},
    utilities::format_price,
};

const NO_CITY: &str = "-- Choose a city or enter coordinates manually --";

const ACCENT: Color32 = Color32::from_rgb(37, 99, 235);
const SUCCESS: Color32 = Color32::from_rgb(22, 163, 74);
const DANGER: Color32 = Color32::from_rgb(185, 28, 28);

pub struct PredictorAppConfig {
    pub controller: SubmissionController,
    pub form: FormState,
    pub start_in_fullscreen: bool,
    pub endpoint: String,
}

pub struct PredictorApp {
    form: FormState,
    controller: SubmissionController,
    submission: SubmissionState,
    last_submission_version: u64,
    start_in_fullscreen: bool,
    endpoint: String,
}

impl PredictorApp {
    pub fn new(config: PredictorAppConfig) -> Self {
        Self {
            form: config.form,
            submission: config.controller.snapshot(),
            last_submission_version: config.controller.version(),
            controller: config.controller,
            start_in_fullscreen: config.start_in_fullscreen,
            endpoint: config.endpoint,
        }
    }

    pub fn init_with_context(&mut self, ctx: &Context) {
        set_styles(ctx);

        if self.start_in_fullscreen {
            ctx.send_viewport_cmd(ViewportCommand::Fullscreen(true));
        }
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    fn refresh_submission(&mut self) {
        let current = self.controller.version();
        if current != self.last_submission_version {
            self.submission = self.controller.snapshot();
            self.last_submission_version = current;
        }
    }

    fn submit(&mut self) {
        self.controller.submit(&self.form);
        self.refresh_submission();
    }

    fn show_city_selector(&mut self, ui: &mut Ui) {
        egui::Frame::new()
            .fill(Color32::from_rgb(239, 246, 255))
            .stroke(Stroke::new(1.0, Color32::from_rgb(191, 219, 254)))
            .corner_radius(CornerRadius::same(8))
            .inner_margin(Margin::same(12))
            .show(ui, |ui| {
                ui.label(RichText::new("Select California City (Optional)").strong());

                let cities = self.form.cities();
                let mut selected = self.form.selected_city().to_string();
                let selected_text = if selected.is_empty() { NO_CITY.to_string() } else { selected.clone() };

                ComboBox::from_id_salt("city combo")
                    .selected_text(selected_text)
                    .width(ui.available_width())
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut selected, String::new(), NO_CITY);
                        for city in cities {
                            ui.selectable_value(&mut selected, city.name.to_string(), city.name);
                        }
                    });

                if selected != self.form.selected_city() {
                    self.form.select_city(&selected);
                }

                ui.label(RichText::new("Select a city to auto-fill longitude and latitude").small());
            });
    }

    fn show_fields(&mut self, ui: &mut Ui) {
        egui::Grid::new("field_grid")
            .num_columns(3)
            .spacing(vec2(16.0, 12.0))
            .show(ui, |ui| {
                for (i, field) in FieldName::ALL.into_iter().enumerate() {
                    let spec = field.spec();
                    ui.vertical(|ui| {
                        ui.label(RichText::new(spec.label).strong());
                        ui.add(
                            egui::TextEdit::singleline(self.form.value_mut(field))
                                .hint_text(spec.hint)
                                .desired_width(210.0),
                        )
                        .on_hover_text(range_hint(&spec));
                    });

                    if (i + 1) % 3 == 0 {
                        ui.end_row();
                    }
                }
            });
    }

    fn show_submit_button(&mut self, ui: &mut Ui) {
        let in_flight = self.submission.in_flight;
        let label = if in_flight { "Predicting..." } else { "Predict Price" };
        let spinner = in_flight.then(|| ui.spacing().interact_size.y + ui.spacing().item_spacing.x);
        let button = Button::new(RichText::new(label).color(Color32::WHITE).strong())
            .fill(ACCENT)
            .corner_radius(CornerRadius::same(8))
            .min_size(vec2(submit_button_width(ui.available_width(), spinner), 40.0));

        ui.horizontal(|ui| {
            if ui.add_enabled(!in_flight, button).clicked() {
                self.submit();
            }
            if in_flight {
                ui.add(egui::Spinner::new());
            }
        });
    }

    fn show_prediction(&self, ui: &mut Ui) {
        ui.heading(RichText::new("Prediction").color(SUCCESS));
        ui.add_space(8.0);

        match self.submission.render_state() {
            RenderState::Success(price) => {
                egui::Frame::new()
                    .fill(Color32::from_rgb(236, 253, 245))
                    .corner_radius(CornerRadius::same(8))
                    .inner_margin(Margin::same(16))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.label(RichText::new("Estimated Price").small().strong());
                        ui.label(RichText::new(format!("${}", format_price(price))).size(30.0).color(SUCCESS).strong());
                    });
                ui.add_space(6.0);
                ui.label(
                    RichText::new("This prediction is based on historical California housing data and market trends.")
                        .small(),
                );
            }
            RenderState::Failure(message) => {
                egui::Frame::new()
                    .fill(Color32::from_rgb(254, 242, 242))
                    .stroke(Stroke::new(1.0, Color32::from_rgb(254, 202, 202)))
                    .corner_radius(CornerRadius::same(8))
                    .inner_margin(Margin::same(12))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.label(RichText::new(message).color(DANGER));
                    });
            }
            RenderState::Idle | RenderState::Pending => {
                ui.add_space(24.0);
                ui.vertical_centered(|ui| {
                    ui.label(
                        RichText::new("Enter property details and click predict to see the estimated price.")
                            .color(Color32::GRAY),
                    );
                });
                ui.add_space(24.0);
            }
        }

        ui.add_space(12.0);
        tip_card(ui, "Tip", "Median income is measured in tens of thousands of dollars.");
        ui.add_space(6.0);
        tip_card(ui, "Location", "Longitude and latitude determine the exact location in California.");
    }

    pub fn ui(&mut self, ctx: &Context) {
        self.refresh_submission();

        if let Some(old_fullscreen) = ctx.input(|i| {
            if i.key_pressed(Key::F11) {
                i.viewport().fullscreen
            } else {
                None
            }
        }) {
            ctx.send_viewport_cmd(ViewportCommand::Fullscreen(!old_fullscreen));
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.label(RichText::new("California House Price Predictor").strong());

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Quit").clicked() {
                        ui.ctx().send_viewport_cmd(ViewportCommand::Close);
                    }
                    ui.add_space(12.0);
                    ui.label(RichText::new(&self.endpoint).small().color(Color32::GRAY));
                });
            });
        });

        egui::SidePanel::right("prediction_panel")
            .resizable(false)
            .exact_width(340.0)
            .show(ctx, |ui| {
                ui.add_space(12.0);
                self.show_prediction(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(8.0);
                ui.heading(RichText::new("Property Details").color(ACCENT));
                ui.add_space(8.0);

                self.show_city_selector(ui);
                ui.add_space(12.0);

                self.show_fields(ui);
                ui.add_space(16.0);

                self.show_submit_button(ui);
                ui.add_space(20.0);

                ui.separator();
                ui.label(RichText::new("About This Predictor").strong());
                ui.label(
                    "This model uses LightGBM machine learning algorithm trained on California housing data. \
                     It considers factors like location, property age, household income, and housing density to \
                     provide accurate price predictions. The predictions are estimates and should be used as a \
                     guide alongside professional property valuations.",
                );
            });
        });
    }
}

/// Leaves room for the spinner (its size plus spacing) next to the button.
fn submit_button_width(available: f32, spinner: Option<f32>) -> f32 {
    (available - spinner.unwrap_or(0.0)).max(0.0)
}

fn range_hint(spec: &FieldSpec) -> String {
    match (spec.min, spec.max) {
        (Some(min), Some(max)) => format!("step {}, expected {} to {}", spec.step, min, max),
        (Some(min), None) => format!("step {}, at least {}", spec.step, min),
        (None, Some(max)) => format!("step {}, at most {}", spec.step, max),
        (None, None) => format!("step {}", spec.step),
    }
}

fn tip_card(ui: &mut Ui, title: &str, body: &str) {
    egui::Frame::new()
        .fill(Color32::from_rgb(245, 243, 255))
        .corner_radius(CornerRadius::same(8))
        .inner_margin(Margin::same(10))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new(title).small().strong());
            ui.label(RichText::new(body).small());
        });
}

pub fn set_styles(ctx: &egui::Context) {
    ctx.set_visuals(egui::Visuals::light());

    let mut style = (*ctx.style()).clone();
    style.text_styles = [
        (egui::TextStyle::Heading, egui::FontId::new(22.0, egui::FontFamily::Proportional)),
        (egui::TextStyle::Body, egui::FontId::new(15.0, egui::FontFamily::Proportional)),
        (egui::TextStyle::Button, egui::FontId::new(16.0, egui::FontFamily::Proportional)),
        (egui::TextStyle::Small, egui::FontId::new(12.0, egui::FontFamily::Proportional)),
        (egui::TextStyle::Monospace, egui::FontId::new(13.0, egui::FontFamily::Monospace)),
    ]
    .into();
    ctx.set_style(style);
}
