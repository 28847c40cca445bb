use adw::prelude::*;
use adw::{Application, ApplicationWindow, StyleManager};
use gtk4::{gdk, glib, CssProvider};
use std::rc::Rc;

mod app;
mod browser;
mod error;
mod fetch_task;
mod inventory;
mod logger;
mod pip;
mod probe;
mod settings;
mod ui;
mod utils;

use logger::log_info;
use ui::PipGui;

const APP_ID: &str = "io.github.pipdeck.Pipdeck";
const CSS: &str = include_str!("style.css");

fn main() -> glib::ExitCode {
    settings::init();

    log_info("Pipdeck starting");

    let app = Application::builder().application_id(APP_ID).build();

    app.connect_startup(|_| {
        let style_manager = StyleManager::default();
        match settings::get().theme.as_str() {
            "light" => style_manager.set_color_scheme(adw::ColorScheme::ForceLight),
            "dark" => style_manager.set_color_scheme(adw::ColorScheme::ForceDark),
            _ => style_manager.set_color_scheme(adw::ColorScheme::Default),
        }

        load_css();
    });

    app.connect_activate(build_ui);

    let exit_code = app.run();

    log_info(&format!("Pipdeck exiting with code: {:?}", exit_code));

    exit_code
}

fn load_css() {
    let Some(display) = gdk::Display::default() else {
        log_info("No display available, skipping CSS provider registration");
        return;
    };

    let provider = CssProvider::new();
    provider.load_from_data(CSS);

    gtk4::style_context_add_provider_for_display(
        &display,
        &provider,
        gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
    );
}

fn build_ui(app: &Application) {
    log_info("Building UI");

    let window = ApplicationWindow::builder()
        .application(app)
        .title("Python Dependency Manager")
        .default_width(900)
        .default_height(700)
        .build();
    window.add_css_class("main-window");

    let gui = Rc::new(PipGui::new());
    window.set_content(Some(gui.main_widget()));

    window.connect_close_request(move |_| {
        gui.shutdown();
        glib::Propagation::Proceed
    });

    window.present();
}
