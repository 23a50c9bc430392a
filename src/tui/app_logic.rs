use super::app_state::{AppMode, ModelChoice};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

pub struct PickerApp {
    pub(super) models: Vec<String>,
    pub(super) current_selection_idx: usize,
    pub(super) scroll_offset: usize,
    pub(super) quit: bool,
    pub(super) choice: Option<ModelChoice>,
    pub(super) mode: AppMode,
    pub(super) filter_input: String,
    pub(super) filter_cursor_pos: usize,
    pub(super) list_viewport_height: usize,
}

impl PickerApp {
    pub fn new(models: Vec<String>) -> Self {
        PickerApp {
            models,
            current_selection_idx: 0,
            scroll_offset: 0,
            quit: false,
            choice: None,
            mode: AppMode::Normal,
            filter_input: String::new(),
            filter_cursor_pos: 0,
            list_viewport_height: 0, // set by ui_renderer on first draw
        }
    }

    /// Indices into `models` that pass the current filter, in order.
    pub(super) fn get_visible_model_indices(&self) -> Vec<usize> {
        let needle = self.filter_input.to_lowercase();
        self.models
            .iter()
            .enumerate()
            .filter(|(_, name)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub(super) fn selected_model(&self) -> Option<&str> {
        self.get_visible_model_indices()
            .contains(&self.current_selection_idx)
            .then(|| self.models[self.current_selection_idx].as_str())
    }

    fn move_selection_in_visible_list(&mut self, delta: i32) {
        let visible_indices = self.get_visible_model_indices();
        if visible_indices.is_empty() {
            return;
        }
        let new_pos = match visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            Some(pos) => (pos as i32 + delta).rem_euclid(visible_indices.len() as i32) as usize,
            None => 0,
        };
        self.current_selection_idx = visible_indices[new_pos];
        self.ensure_selection_is_visible_in_viewport();
    }

    fn ensure_selection_is_valid_after_filter(&mut self) {
        let visible_indices = self.get_visible_model_indices();
        if !visible_indices.contains(&self.current_selection_idx) {
            self.current_selection_idx = *visible_indices.first().unwrap_or(&0);
            self.scroll_offset = 0;
        }
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn ensure_selection_is_visible_in_viewport(&mut self) {
        if self.list_viewport_height == 0 {
            return;
        }
        let visible_indices = self.get_visible_model_indices();
        let list_height = self.list_viewport_height;
        if let Some(pos) = visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            if pos < self.scroll_offset {
                self.scroll_offset = pos;
            } else if pos >= self.scroll_offset + list_height {
                self.scroll_offset = pos + 1 - list_height;
            }
        }
        let num_visible = visible_indices.len();
        if num_visible <= list_height {
            self.scroll_offset = 0;
        } else {
            self.scroll_offset = self.scroll_offset.min(num_visible - list_height);
        }
    }

    fn finish(&mut self, save_as_default: bool) {
        if let Some(model) = self.selected_model() {
            self.choice = Some(ModelChoice {
                model: model.to_string(),
                save_as_default,
            });
        }
        self.quit = true;
    }

    pub(super) fn handle_normal_mode_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.quit = true
            }
            KeyCode::Char('/') => self.mode = AppMode::Filtering,
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_in_visible_list(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_in_visible_list(-1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if self.selected_model().is_some() {
                    self.mode = AppMode::ConfirmDefault;
                }
            }
            _ => {}
        }
    }

    pub(super) fn handle_filtering_mode_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Enter => {
                self.mode = AppMode::Normal;
                self.ensure_selection_is_valid_after_filter();
            }
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.filter_input.clear();
                self.filter_cursor_pos = 0;
                self.ensure_selection_is_valid_after_filter();
            }
            KeyCode::Char(c) => {
                self.filter_input.insert(self.filter_cursor_pos, c);
                self.filter_cursor_pos += c.len_utf8();
                self.ensure_selection_is_valid_after_filter();
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.filter_input[..self.filter_cursor_pos].chars().next_back() {
                    self.filter_cursor_pos -= prev.len_utf8();
                    self.filter_input.remove(self.filter_cursor_pos);
                    self.ensure_selection_is_valid_after_filter();
                }
            }
            _ => {}
        }
    }

    pub(super) fn handle_confirm_default_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.finish(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Enter => self.finish(false),
            KeyCode::Esc => self.mode = AppMode::Normal,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> PickerApp {
        PickerApp::new(vec![
            "gemma2:9b".to_string(),
            "llama3:8b".to_string(),
            "mistral:7b".to_string(),
        ])
    }

    #[test]
    fn navigation_wraps_around() {
        let mut a = app();
        a.handle_normal_mode_input(key(KeyCode::Up));
        assert_eq!(a.selected_model(), Some("mistral:7b"));
        a.handle_normal_mode_input(key(KeyCode::Char('j')));
        assert_eq!(a.selected_model(), Some("gemma2:9b"));
    }

    #[test]
    fn pick_then_save_as_default() {
        let mut a = app();
        a.handle_normal_mode_input(key(KeyCode::Down));
        a.handle_normal_mode_input(key(KeyCode::Enter));
        assert_eq!(a.mode, AppMode::ConfirmDefault);
        a.handle_confirm_default_input(key(KeyCode::Char('y')));
        assert!(a.quit);
        assert_eq!(
            a.choice,
            Some(ModelChoice {
                model: "llama3:8b".to_string(),
                save_as_default: true
            })
        );
    }

    #[test]
    fn filter_narrows_and_reselects() {
        let mut a = app();
        a.handle_normal_mode_input(key(KeyCode::Char('/')));
        for c in "mis".chars() {
            a.handle_filtering_mode_input(key(KeyCode::Char(c)));
        }
        a.handle_filtering_mode_input(key(KeyCode::Enter));
        assert_eq!(a.get_visible_model_indices(), vec![2]);
        assert_eq!(a.selected_model(), Some("mistral:7b"));
    }

    #[test]
    fn quitting_yields_no_choice() {
        let mut a = app();
        a.handle_normal_mode_input(key(KeyCode::Char('q')));
        assert!(a.quit);
        assert!(a.choice.is_none());
    }
}
