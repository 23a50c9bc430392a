// Full-screen model picker shown when no usable default model is configured.
mod app_logic;
mod app_state;
mod event_handler;
mod ui_renderer;

pub use app_state::ModelChoice;

pub use self::run_tui::pick_model;

mod run_tui {
    use super::app_logic::PickerApp;
    use super::app_state::ModelChoice;
    use super::event_handler::handle_events;
    use super::ui_renderer::ui_frame;
    use anyhow::Result;
    use crossterm::{
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    };
    use ratatui::prelude::{CrosstermBackend, Terminal};
    use std::io::{self, Stderr};

    /// Returns `None` when the user quits without picking.
    pub fn pick_model(models: &[String]) -> Result<Option<ModelChoice>> {
        if models.is_empty() {
            return Ok(None);
        }
        let mut app = PickerApp::new(models.to_vec());

        let mut terminal = init_terminal()?;
        let loop_result = (|| -> Result<()> {
            while !app.quit {
                terminal.draw(|frame| ui_frame(frame, &mut app))?;
                handle_events(&mut app)?;
            }
            Ok(())
        })();
        restore_terminal(terminal)?;
        loop_result?;

        Ok(app.choice)
    }

    // Drawn on stderr: stdout carries judgements only.
    fn init_terminal() -> Result<Terminal<CrosstermBackend<Stderr>>> {
        enable_raw_mode()?;
        let mut stderr = io::stderr();
        execute!(stderr, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stderr);
        Terminal::new(backend).map_err(Into::into)
    }

    fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stderr>>) -> Result<()> {
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor().map_err(Into::into)
    }
}
