use anyhow::Result;

mod app;
mod chat;
mod config;
mod handler;
mod ollama;
mod tui;
mod ui;

use app::App;
use ollama::OllamaClient;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    tui::install_panic_hook();

    let ollama = OllamaClient::new(config::OLLAMA_BASE_URL);
    let (model, probe_status) = resolve_model(&ollama).await;

    let mut app = App::new(ollama, model);
    app.status = probe_status;

    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if let Some(event) = events.next().await {
            let tx = events.sender();
            handler::handle_event(&mut app, event, &tx);
        }
    }

    tui::restore()?;
    Ok(())
}

/// Startup model probe. When the server reports a TinyLlama-family tag,
/// the active model is pinned to the known-good identifier — an explicit
/// override, applied only here. A missing model or unreachable server is
/// reported as a status hint; the session still starts and turns fail at
/// the turn boundary.
async fn resolve_model(ollama: &OllamaClient) -> (String, Option<String>) {
    match ollama.list_models().await {
        Ok(tags) => {
            if has_tinyllama(&tags) {
                (config::PINNED_MODEL.to_string(), None)
            } else {
                (
                    config::MODEL_NAME.to_string(),
                    Some(format!(
                        "Model '{}' not found. Pull it with: ollama pull tinyllama",
                        config::MODEL_NAME
                    )),
                )
            }
        }
        Err(e) => (
            config::MODEL_NAME.to_string(),
            Some(format!("Could not reach Ollama ({e}). Start it with: ollama serve")),
        ),
    }
}

fn has_tinyllama(tags: &[String]) -> bool {
    tags.iter()
        .any(|tag| tag.to_lowercase().contains("tinyllama"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_pins_on_any_tinyllama_tag() {
        let tags = vec!["llama3.2:latest".to_string(), "TinyLlama:1.1b".to_string()];
        assert!(has_tinyllama(&tags));
    }

    #[test]
    fn probe_does_not_pin_without_the_family() {
        let tags = vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()];
        assert!(!has_tinyllama(&tags));
    }
}
