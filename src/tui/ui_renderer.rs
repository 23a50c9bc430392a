use super::app_logic::PickerApp;
use super::app_state::AppMode;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

fn draw_help_block(f: &mut Frame, app: &PickerApp, area: Rect) {
    let help_text_lines_content = match app.mode {
        AppMode::ConfirmDefault => vec![
            Line::from(format!(
                "Set '{}' as default for future runs?",
                app.selected_model().unwrap_or_default()
            )),
            Line::from("y: Yes | n/Enter: No, just this run | Esc: Back"),
        ],
        _ => vec![
            Line::from("Arrows/jk: Nav | Enter: Pick | /: Filter | q/Esc: Quit"),
            Line::from("No default model is configured (or it is no longer installed)."),
        ],
    };
    let help_paragraph = Paragraph::new(help_text_lines_content).block(
        Block::default()
            .borders(Borders::ALL)
            .title("dmarcwatch: Select an Ollama model"),
    );
    f.render_widget(help_paragraph, area);
}

fn draw_filter_input_block(f: &mut Frame, app: &PickerApp, area: Rect) {
    let input_text = format!("/{}", app.filter_input);
    let filter_paragraph = Paragraph::new(input_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Filter (Esc to cancel, Enter to apply)"),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(filter_paragraph, area);
    let cursor_col = app.filter_input[..app.filter_cursor_pos].chars().count() as u16;
    f.set_cursor_position((area.x + 1 + cursor_col + 1, area.y + 1));
}

fn draw_main_list_block(f: &mut Frame, app: &mut PickerApp, area: Rect) {
    app.list_viewport_height = area.height.saturating_sub(2) as usize;
    app.ensure_selection_is_visible_in_viewport();

    let visible = app.get_visible_model_indices();
    let window = visible
        .get(app.scroll_offset..(app.scroll_offset + app.list_viewport_height).min(visible.len()))
        .unwrap_or(&[]);

    let list_items: Vec<ListItem> = window
        .iter()
        .map(|&idx| ListItem::new(format!("{:>3}. {}", idx + 1, app.models[idx])))
        .collect();

    let list_title = if !app.filter_input.is_empty() && app.mode != AppMode::Filtering {
        format!("Models (Filter: '{}')", app.filter_input)
    } else {
        format!("Available models ({})", app.models.len())
    };

    let list_widget = List::new(list_items)
        .block(Block::default().borders(Borders::ALL).title(list_title))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("❯ ");

    let mut list_state = ratatui::widgets::ListState::default();
    if let Some(pos) = window
        .iter()
        .position(|&idx| idx == app.current_selection_idx)
    {
        list_state.select(Some(pos));
    }
    f.render_stateful_widget(list_widget, area, &mut list_state);
}

pub(super) fn ui_frame(frame: &mut Frame, app: &mut PickerApp) {
    let help_lines = 2;
    let filter_input_height = if app.mode == AppMode::Filtering { 3 } else { 0 };

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(help_lines + 2 + filter_input_height),
            Constraint::Min(0),
        ])
        .split(frame.area());

    let top_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(help_lines + 2),
            Constraint::Length(filter_input_height),
        ])
        .split(main_chunks[0]);

    draw_help_block(frame, app, top_chunks[0]);
    if app.mode == AppMode::Filtering {
        draw_filter_input_block(frame, app, top_chunks[1]);
    }

    draw_main_list_block(frame, app, main_chunks[1]);
}
