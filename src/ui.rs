use adw::prelude::*;
use adw::{AlertDialog, HeaderBar, ResponseAppearance, StatusPage};
use gtk4::{
    glib, Box, Button, Image, Label, ListBox, ListBoxRow, Orientation, ProgressBar,
    ScrolledWindow, SearchEntry, SelectionMode, TextView, Window,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{AppState, FetchOutcome, Row, UninstallOutcome};
use crate::browser;
use crate::logger::{log_error, log_info};
use crate::pip::PipBackend;
use crate::probe::PythonProber;

type State = Rc<RefCell<AppState<PipBackend, PythonProber>>>;

#[derive(Clone)]
struct Widgets {
    list_box: ListBox,
    search_entry: SearchEntry,
    status_label: Label,
    progress_bar: ProgressBar,
    refresh_btn: Button,
    count_label: Label,
    // Rows currently in `list_box`, in display order.
    shown: Rc<RefCell<Vec<Row>>>,
}

pub struct PipGui {
    main_box: Box,
    state: Option<State>,
}

impl PipGui {
    pub fn new() -> Self {
        let main_box = Box::new(Orientation::Vertical, 0);

        let header_bar = HeaderBar::new();
        header_bar.set_show_end_title_buttons(true);

        let title_box = Box::new(Orientation::Horizontal, 8);
        let app_icon = Image::from_icon_name("package-x-generic-symbolic");
        app_icon.set_pixel_size(24);
        app_icon.add_css_class("accent");
        title_box.append(&app_icon);

        let title_label = Label::new(Some("Python Dependency Manager"));
        title_label.add_css_class("title");
        title_box.append(&title_label);
        header_bar.set_title_widget(Some(&title_box));
        main_box.append(&header_bar);

        let settings = crate::settings::get();
        let backend = PipBackend::from_settings();
        if !backend.is_available() {
            log_error(&format!("pip command not found: {}", settings.pip_command));
            let status_page = StatusPage::builder()
                .icon_name("dialog-error-symbolic")
                .title("pip Not Found")
                .description(format!(
                    "The configured pip command ({}) could not be found.\n\n\
                     Install Python and pip, or set \"pip_command\" in settings.json.",
                    settings.pip_command
                ))
                .build();
            status_page.set_vexpand(true);
            status_page.add_css_class("error-page");
            main_box.append(&status_page);
            return Self {
                main_box,
                state: None,
            };
        }

        let state: State = Rc::new(RefCell::new(AppState::new(
            Arc::new(backend),
            Arc::new(PythonProber::from_settings()),
            settings.search_url,
        )));

        // Toolbar: search + actions
        let toolbar = Box::new(Orientation::Horizontal, 8);
        toolbar.set_margin_start(10);
        toolbar.set_margin_end(10);
        toolbar.set_margin_top(10);
        toolbar.set_margin_bottom(10);

        let search_entry = SearchEntry::new();
        search_entry.set_placeholder_text(Some("Filter packages..."));
        search_entry.set_width_chars(30);
        toolbar.append(&search_entry);

        let search_btn = Button::with_label("Search");
        toolbar.append(&search_btn);

        let refresh_btn = Self::create_action_button(
            "Refresh",
            "view-refresh-symbolic",
            "Reload the installed package list",
        );
        refresh_btn.add_css_class("suggested-action");
        toolbar.append(&refresh_btn);

        let details_btn = Self::create_action_button(
            "View Details",
            "dialog-information-symbolic",
            "Show pip metadata for the selected package",
        );
        toolbar.append(&details_btn);

        let uninstall_btn = Self::create_action_button(
            "Uninstall Selected",
            "user-trash-symbolic",
            "Remove the selected package",
        );
        uninstall_btn.add_css_class("destructive-action");
        toolbar.append(&uninstall_btn);

        let more_btn = Self::create_action_button(
            "More",
            "web-browser-symbolic",
            "Search the web for what the package is for",
        );
        toolbar.append(&more_btn);

        let count_label = Label::new(Some("0 packages"));
        count_label.add_css_class("badge");
        count_label.set_halign(gtk4::Align::End);
        count_label.set_hexpand(true);
        toolbar.append(&count_label);

        main_box.append(&toolbar);

        // Package table
        let table_box = Box::new(Orientation::Vertical, 0);
        table_box.set_margin_start(10);
        table_box.set_margin_end(10);
        table_box.add_css_class("card");

        let heading = Self::create_row_box("Package Name", "Version", "Status");
        heading.add_css_class("column-heading");
        table_box.append(&heading);

        let scrolled = ScrolledWindow::new();
        scrolled.set_vexpand(true);

        let list_box = ListBox::new();
        list_box.set_selection_mode(SelectionMode::Single);
        list_box.add_css_class("package-table");

        let placeholder = Label::new(Some("No packages to show"));
        placeholder.add_css_class("dim-label");
        placeholder.set_margin_top(48);
        placeholder.set_margin_bottom(48);
        list_box.set_placeholder(Some(&placeholder));

        scrolled.set_child(Some(&list_box));
        table_box.append(&scrolled);
        main_box.append(&table_box);

        // Progress and status
        let progress_bar = ProgressBar::new();
        progress_bar.set_margin_start(10);
        progress_bar.set_margin_end(10);
        progress_bar.set_margin_top(10);
        main_box.append(&progress_bar);

        let status_label = Label::new(Some(state.borrow().status()));
        status_label.set_xalign(0.0);
        status_label.add_css_class("caption");
        status_label.set_margin_start(10);
        status_label.set_margin_end(10);
        status_label.set_margin_top(6);
        status_label.set_margin_bottom(10);
        main_box.append(&status_label);

        let widgets = Widgets {
            list_box,
            search_entry,
            status_label,
            progress_bar,
            refresh_btn,
            count_label,
            shown: Rc::new(RefCell::new(Vec::new())),
        };

        Self::connect_search(&state, &widgets, &search_btn);
        Self::connect_refresh(&state, &widgets);
        Self::connect_details(&state, &widgets, &details_btn);
        Self::connect_uninstall(&state, &widgets, &uninstall_btn);
        Self::connect_more(&state, &widgets, &more_btn);
        Self::start_polling(&state, &widgets);

        // Initial load
        Self::refresh(&state, &widgets);

        Self {
            main_box,
            state: Some(state),
        }
    }

    pub fn main_widget(&self) -> &Box {
        &self.main_box
    }

    /// Detaches a fetch that is still running so its result is dropped.
    pub fn shutdown(&self) {
        if let Some(state) = &self.state {
            if state.borrow_mut().cancel_fetch() {
                log_info("Discarded in-flight fetch on shutdown");
            }
        }
    }

    fn create_action_button(label: &str, icon_name: &str, tooltip: &str) -> Button {
        let content_box = Box::new(Orientation::Horizontal, 6);

        let icon = Image::from_icon_name(icon_name);
        content_box.append(&icon);

        let label_widget = Label::new(Some(label));
        content_box.append(&label_widget);

        let btn = Button::new();
        btn.set_child(Some(&content_box));
        btn.set_tooltip_text(Some(tooltip));
        btn
    }

    fn create_row_box(name: &str, version: &str, status: &str) -> Box {
        let row_box = Box::new(Orientation::Horizontal, 12);
        row_box.set_margin_start(12);
        row_box.set_margin_end(12);
        row_box.set_margin_top(6);
        row_box.set_margin_bottom(6);

        let name_label = Label::new(Some(name));
        name_label.set_xalign(0.0);
        name_label.set_hexpand(true);
        name_label.set_width_chars(30);
        name_label.set_ellipsize(gtk4::pango::EllipsizeMode::End);
        row_box.append(&name_label);

        let version_label = Label::new(Some(version));
        version_label.set_xalign(0.0);
        version_label.set_width_chars(14);
        row_box.append(&version_label);

        let status_label = Label::new(Some(status));
        status_label.set_xalign(0.0);
        status_label.set_width_chars(16);
        row_box.append(&status_label);

        row_box
    }

    fn show_rows(state: &State, widgets: &Widgets, rows: Vec<Row>) {
        Self::render_rows(&widgets.list_box, &rows);
        widgets.count_label.set_text(&format!(
            "{} / {} packages",
            rows.len(),
            state.borrow().records().len()
        ));
        *widgets.shown.borrow_mut() = rows;
    }

    fn render_rows(list_box: &ListBox, rows: &[Row]) {
        while let Some(child) = list_box.first_child() {
            list_box.remove(&child);
        }

        for row in rows {
            let list_row = ListBoxRow::new();
            list_row.add_css_class(if row.odd { "oddrow" } else { "evenrow" });

            let row_box = Self::create_row_box(&row.name, &row.version, row.status);
            let status_class = match row.status {
                "OK" => "status-ok",
                "Not Functional" => "status-broken",
                _ => "status-unknown",
            };
            row_box.add_css_class(status_class);

            list_row.set_child(Some(&row_box));
            list_box.append(&list_row);
        }
    }

    fn selected_package(widgets: &Widgets) -> Option<String> {
        let index = widgets.list_box.selected_row()?.index();
        row_name_at(&widgets.shown.borrow(), index)
    }

    fn sync_status(state: &State, widgets: &Widgets) {
        let state = state.borrow();
        widgets.status_label.set_text(state.status());
        widgets.refresh_btn.set_sensitive(!state.is_fetching());
        if !state.is_fetching() {
            widgets.progress_bar.set_fraction(0.0);
        }
    }

    fn refresh(state: &State, widgets: &Widgets) {
        state.borrow_mut().refresh();
        Self::sync_status(state, widgets);
    }

    fn connect_search(state: &State, widgets: &Widgets, search_btn: &Button) {
        let apply_filter = {
            let state = state.clone();
            let widgets = widgets.clone();
            Rc::new(move || {
                let query = widgets.search_entry.text().to_string();
                let rows = state.borrow_mut().filter(&query);
                Self::show_rows(&state, &widgets, rows);
            })
        };

        let apply = apply_filter.clone();
        widgets.search_entry.connect_search_changed(move |_| apply());

        let apply = apply_filter.clone();
        widgets.search_entry.connect_activate(move |_| apply());

        search_btn.connect_clicked(move |_| apply_filter());
    }

    fn connect_refresh(state: &State, widgets: &Widgets) {
        let state = state.clone();
        let widgets_clone = widgets.clone();
        widgets.refresh_btn.connect_clicked(move |_| {
            log_info("Refresh requested");
            Self::refresh(&state, &widgets_clone);
        });
    }

    fn connect_details(state: &State, widgets: &Widgets, details_btn: &Button) {
        let state = state.clone();
        let widgets = widgets.clone();
        details_btn.connect_clicked(move |_| {
            let Some(name) = Self::selected_package(&widgets) else {
                Self::show_message(
                    &widgets.list_box,
                    "No Selection",
                    "Please select a package to view details.",
                );
                return;
            };
            let details = state.borrow().details(&name);
            Self::show_details_window(&widgets.list_box, &name, &details);
        });
    }

    fn connect_uninstall(state: &State, widgets: &Widgets, uninstall_btn: &Button) {
        let state = state.clone();
        let widgets = widgets.clone();
        uninstall_btn.connect_clicked(move |_| {
            let Some(name) = Self::selected_package(&widgets) else {
                Self::show_message(
                    &widgets.list_box,
                    "No Selection",
                    "Please select a package to uninstall.",
                );
                return;
            };

            let dialog = AlertDialog::new(
                Some("Confirm Uninstall"),
                Some(&format!("Are you sure you want to uninstall {}?", name)),
            );
            dialog.add_response("cancel", "Cancel");
            dialog.add_response("uninstall", "Uninstall");
            dialog.set_response_appearance("uninstall", ResponseAppearance::Destructive);
            dialog.set_default_response(Some("cancel"));
            dialog.set_close_response("cancel");

            let state = state.clone();
            let dialog_widgets = widgets.clone();
            dialog.connect_response(None, move |_, response| {
                let widgets = &dialog_widgets;
                let confirmed = response == "uninstall";
                let outcome = state.borrow_mut().uninstall(&name, |_| confirmed);
                match outcome {
                    UninstallOutcome::Removed => {
                        Self::show_message(
                            &widgets.list_box,
                            "Success",
                            &format!("{} has been uninstalled.", name),
                        );
                    }
                    UninstallOutcome::Failed(e) => {
                        Self::show_message(
                            &widgets.list_box,
                            "Error",
                            &format!("Failed to uninstall {}.\n\n{}", name, e),
                        );
                    }
                    UninstallOutcome::UnknownPackage => {
                        Self::show_message(
                            &widgets.list_box,
                            "Error",
                            &format!(
                                "{} is no longer in the package list. Refresh and try again.",
                                name
                            ),
                        );
                    }
                    UninstallOutcome::Declined => {}
                }
                Self::sync_status(&state, widgets);
            });

            dialog.present(Some(&widgets.list_box));
        });
    }

    fn connect_more(state: &State, widgets: &Widgets, more_btn: &Button) {
        let state = state.clone();
        let widgets = widgets.clone();
        more_btn.connect_clicked(move |_| {
            let Some(name) = Self::selected_package(&widgets) else {
                Self::show_message(
                    &widgets.list_box,
                    "No Selection",
                    "Please select a package to search for.",
                );
                return;
            };
            let url = state.borrow().search_url(&name);
            if let Err(e) = browser::open_url(&url) {
                Self::show_message(&widgets.list_box, "Error", &e);
            }
        });
    }

    /// Picks up finished fetches on the main loop; the worker never touches widgets.
    fn start_polling(state: &State, widgets: &Widgets) {
        let state = state.clone();
        let widgets = widgets.clone();

        glib::timeout_add_local(Duration::from_millis(100), move || {
            let outcome = state.borrow_mut().poll_fetch();

            if state.borrow().is_fetching() {
                widgets.progress_bar.pulse();
            }

            if let Some(outcome) = outcome {
                if let FetchOutcome::Loaded = outcome {
                    let rows = state.borrow().visible_rows();
                    Self::show_rows(&state, &widgets, rows);
                }
                Self::sync_status(&state, &widgets);
            }

            let error = state.borrow_mut().take_error();
            if let Some(error) = error {
                Self::show_message(&widgets.list_box, "Error", &error);
            }

            glib::ControlFlow::Continue
        });
    }

    fn show_message(parent: &impl IsA<gtk4::Widget>, heading: &str, body: &str) {
        let dialog = AlertDialog::new(Some(heading), Some(body));
        dialog.add_response("ok", "OK");
        dialog.set_default_response(Some("ok"));
        dialog.set_close_response("ok");
        dialog.present(Some(parent));
    }

    fn show_details_window(parent: &impl IsA<gtk4::Widget>, package_name: &str, details: &str) {
        let window = Window::builder()
            .title(format!("Details for {}", package_name))
            .default_width(600)
            .default_height(400)
            .modal(true)
            .build();

        if let Some(root) = parent.root().and_then(|w| w.downcast::<Window>().ok()) {
            window.set_transient_for(Some(&root));
        }

        let scrolled = ScrolledWindow::new();
        scrolled.set_vexpand(true);
        scrolled.set_hexpand(true);
        scrolled.set_margin_start(10);
        scrolled.set_margin_end(10);
        scrolled.set_margin_top(10);
        scrolled.set_margin_bottom(10);

        let text_view = TextView::new();
        text_view.set_editable(false);
        text_view.set_cursor_visible(false);
        text_view.set_monospace(true);
        text_view.set_wrap_mode(gtk4::WrapMode::Word);
        text_view.add_css_class("details-text");
        text_view.buffer().set_text(details);

        scrolled.set_child(Some(&text_view));
        window.set_child(Some(&scrolled));
        window.present();
    }
}

/// Package name of the row at `index` in display order. GTK reports -1 for
/// rows that are not in a list.
fn row_name_at(rows: &[Row], index: i32) -> Option<String> {
    let index = usize::try_from(index).ok()?;
    rows.get(index).map(|row| row.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, odd: bool) -> Row {
        Row {
            name: name.to_string(),
            version: "1.0".to_string(),
            status: "OK",
            odd,
        }
    }

    #[test]
    fn selection_index_maps_to_displayed_row() {
        let rows = vec![row("requests", false), row("six", true)];
        assert_eq!(row_name_at(&rows, 0).as_deref(), Some("requests"));
        assert_eq!(row_name_at(&rows, 1).as_deref(), Some("six"));
        assert_eq!(row_name_at(&rows, 2), None);
        assert_eq!(row_name_at(&rows, -1), None);
    }
}
