mod completion;
mod config;
mod dashboard;
mod history;
mod history_view;
mod notify;
mod stats;
mod storage;
mod view;

use iced::{
    clipboard,
    event::{self, Event as IcedEvent},
    keyboard::{self, Key},
    time,
    widget::{column, container, text, text_input, text_input::Id},
    window, Element, Length, Size, Subscription, Task, Theme,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::completion::{Completer, CompletionClient};
use crate::config::Config;
use crate::dashboard::{Dashboard, Outcome};
use crate::history::ConversationStore;
use crate::history_view::HistoryView;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};

fn main() -> iced::Result {
    init_tracing();

    let config = Config::load();
    let window_settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(
            config.window.min_width as f32,
            config.window.min_height as f32,
        )),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("Turbo", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window_settings)
        .run_with(move || App::new(config))
}

fn init_tracing() {
    // TURBO_DEBUG turns on debug output without writing a full RUST_LOG filter.
    let fallback = if std::env::var("TURBO_DEBUG").is_ok() {
        "turbo_dash=debug,info"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();
}

fn open_storage(config: &Config) -> Arc<dyn KeyValueStore> {
    match SqliteStore::open(config.storage.db_path()) {
        Ok(store) => {
            tracing::info!(path = %store.path().display(), "opened conversation storage");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not open storage, history will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Dashboard,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Stats,
    Playground,
}

#[derive(Debug, Clone)]
enum Message {
    Navigate(Page),
    SelectTab(Tab),
    PromptChanged(String),
    Submit,
    CompletionFinished(Result<String, String>),
    Tick,
    CopyResponse,
    SearchChanged(String),
    ClearRequested,
    ClearConfirmed,
    ClearDeclined,
    DismissNotice,
    Escape,
}

struct App {
    page: Page,
    tab: Tab,
    dashboard: Dashboard,
    // Mounted fresh each time the history page opens.
    history: Option<HistoryView>,
    kv: Arc<dyn KeyValueStore>,
    client: Arc<dyn Completer>,
    loading_frame: usize,
    prompt_id: Id,
}

impl App {
    fn new(config: Config) -> (Self, Task<Message>) {
        let kv = open_storage(&config);

        let client = CompletionClient::new(&config.completion, config.completion.api_key());
        tracing::info!(
            backend = ?config.completion.backend,
            model = client.model(),
            "completion client ready"
        );

        let prompt_id = Id::unique();
        let app = App {
            page: Page::Dashboard,
            tab: Tab::Playground,
            dashboard: Dashboard::new(ConversationStore::load(kv.clone())),
            history: None,
            kv,
            client: Arc::new(client),
            loading_frame: 0,
            prompt_id: prompt_id.clone(),
        };

        (app, text_input::focus(prompt_id))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Navigate(Page::Dashboard) => {
                self.page = Page::Dashboard;
                self.history = None;
                self.dashboard.reload();
                Task::none()
            }
            Message::Navigate(Page::History) => {
                self.page = Page::History;
                self.history = Some(HistoryView::mount(self.kv.clone()));
                Task::none()
            }
            Message::SelectTab(tab) => {
                self.tab = tab;
                if tab == Tab::Playground {
                    text_input::focus(self.prompt_id.clone())
                } else {
                    Task::none()
                }
            }
            Message::PromptChanged(value) => {
                self.dashboard.edit_prompt(value);
                Task::none()
            }
            Message::Submit => {
                let Some(prompt) = self.dashboard.submit() else {
                    return Task::none();
                };
                self.loading_frame = 0;

                let client = self.client.clone();
                Task::future(async move {
                    match client.complete(&prompt).await {
                        Ok(response) => Message::CompletionFinished(Ok(response)),
                        Err(e) => {
                            tracing::warn!(error = ?e, status = ?e.status(), "completion failed");
                            Message::CompletionFinished(Err(e.to_string()))
                        }
                    }
                })
            }
            Message::CompletionFinished(result) => {
                self.dashboard.finish(result);
                text_input::focus(self.prompt_id.clone())
            }
            Message::Tick => {
                if self.dashboard.is_submitting() {
                    self.loading_frame = (self.loading_frame + 1) % 80;
                }
                Task::none()
            }
            Message::CopyResponse => match self.dashboard.outcome() {
                Some(Outcome::Succeeded(response)) => clipboard::write(response.clone()),
                _ => Task::none(),
            },
            Message::SearchChanged(query) => {
                if let Some(history) = &mut self.history {
                    history.set_query(query);
                }
                Task::none()
            }
            Message::ClearRequested => {
                if let Some(history) = &mut self.history {
                    history.request_clear();
                }
                Task::none()
            }
            Message::ClearConfirmed => {
                if let Some(notice) = self.history.as_mut().and_then(HistoryView::confirm_clear) {
                    notify::desktop(notice);
                }
                Task::none()
            }
            Message::ClearDeclined => {
                if let Some(history) = &mut self.history {
                    history.decline_clear();
                }
                Task::none()
            }
            Message::DismissNotice => {
                if let Some(history) = &mut self.history {
                    history.dismiss_notice();
                }
                Task::none()
            }
            Message::Escape => {
                if let Some(history) = &mut self.history {
                    history.escape();
                }
                Task::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.dashboard.is_submitting() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Escape)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let body = match self.page {
            Page::Dashboard => view::dashboard(&self.dashboard, self.tab, self.loading_frame, &self.prompt_id),
            Page::History => match &self.history {
                Some(history) => view::history(history),
                None => text("Loading history...").into(),
            },
        };

        container(column![view::nav(self.page), body].spacing(15).padding(15))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
