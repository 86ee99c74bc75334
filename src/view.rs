use chrono::Local;
use iced::widget::{
    button, column, container, horizontal_space, row, scrollable, text, text_input, Column,
};
use iced::{alignment, Color, Element, Length};

use crate::dashboard::{Dashboard, Outcome, Phase};
use crate::history::ConversationRecord;
use crate::history_view::{HistoryView, Notice, CONFIRM_CLEAR};
use crate::{Message, Page, Tab};

fn danger() -> Color {
    Color::from_rgb(0.97, 0.46, 0.56)
}

fn success() -> Color {
    Color::from_rgb(0.62, 0.81, 0.42)
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn nav(page: Page) -> Element<'static, Message> {
    row![
        switch("Dashboard", page == Page::Dashboard, Message::Navigate(Page::Dashboard)),
        switch("History", page == Page::History, Message::Navigate(Page::History)),
    ]
    .spacing(10)
    .into()
}

fn switch(label: &'static str, active: bool, message: Message) -> Element<'static, Message> {
    let style = if active { button::primary } else { button::secondary };
    button(text(label).size(14))
        .on_press(message)
        .style(style)
        .padding(8)
        .into()
}

pub fn dashboard<'a>(
    dashboard: &'a Dashboard,
    tab: Tab,
    loading_frame: usize,
    prompt_id: &text_input::Id,
) -> Element<'a, Message> {
    let tabs = row![
        switch("Dashboard", tab == Tab::Stats, Message::SelectTab(Tab::Stats)),
        switch("Turbo AI", tab == Tab::Playground, Message::SelectTab(Tab::Playground)),
    ]
    .spacing(10);

    let body = match tab {
        Tab::Stats => stats(dashboard),
        Tab::Playground => playground(dashboard, loading_frame, prompt_id),
    };

    column![
        text("Welcome to Turbo").size(26),
        text("Your assistant for all things AI.").size(14),
        tabs,
        body,
    ]
    .spacing(15)
    .into()
}

fn stats(dashboard: &Dashboard) -> Element<'_, Message> {
    let stats = dashboard.stats(Local::now().date_naive());

    row![
        card("Total Queries", stats.total_queries.to_string(), format!("{} today", stats.queries_today)),
        card(
            "Tokens Processed (Est.)",
            stats.estimated_tokens.to_string(),
            "~4 characters per token".to_string(),
        ),
        card("API Calls Today", stats.queries_today.to_string(), String::new()),
    ]
    .spacing(15)
    .into()
}

fn card(title: &'static str, value: String, description: String) -> Element<'static, Message> {
    container(column![text(title).size(13), text(value).size(28), text(description).size(12)].spacing(6))
        .padding(15)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}

fn playground<'a>(
    dashboard: &'a Dashboard,
    loading_frame: usize,
    prompt_id: &text_input::Id,
) -> Element<'a, Message> {
    let mut input = text_input("Ask Turbo anything...", dashboard.prompt())
        .id(prompt_id.clone())
        .padding(15)
        .size(16);
    if !dashboard.is_submitting() {
        input = input
            .on_input(Message::PromptChanged)
            .on_submit(Message::Submit);
    }

    let label = match dashboard.phase() {
        Phase::Submitting => "Processing...",
        Phase::Idle => "Generate Response",
    };
    let submit = button(text(label).size(14))
        .on_press_maybe(dashboard.can_submit().then_some(Message::Submit))
        .padding(10);

    let mut content = column![
        input,
        row![horizontal_space(), submit],
    ]
    .spacing(10);

    if dashboard.is_submitting() {
        let spinner = SPINNER[loading_frame % SPINNER.len()];
        content = content.push(
            container(row![text(spinner).size(24), text("Processing...").size(15)].spacing(10))
                .width(Length::Fill)
                .align_x(alignment::Horizontal::Center),
        );
    }

    match dashboard.outcome() {
        Some(Outcome::Failed(message)) => {
            content = content.push(
                container(column![text("Error:").color(danger()), text(message.as_str())].spacing(4))
                    .padding(10)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
        }
        Some(Outcome::Succeeded(response)) => {
            content = content.push(
                column![
                    row![
                        text("AI Response:").size(15),
                        horizontal_space(),
                        button(text("[Copy]").size(12)).on_press(Message::CopyResponse).padding(6),
                    ],
                    container(text(response.as_str()).size(15))
                        .padding(15)
                        .width(Length::Fill)
                        .style(container::rounded_box),
                ]
                .spacing(6),
            );
        }
        None => {}
    }

    let records = dashboard.store().records();
    if !records.is_empty() {
        content = content.push(text("Conversation Log").size(18));
        content = content.push(log(records));
    }

    scrollable(content.padding(5)).height(Length::Fill).into()
}

fn log(records: &[ConversationRecord]) -> Element<'_, Message> {
    Column::with_children(records.iter().map(entry))
        .spacing(10)
        .into()
}

fn entry(record: &ConversationRecord) -> Element<'_, Message> {
    let when = record
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    container(
        column![
            text(when).size(11),
            text(format!("You: {}", record.prompt)).size(14),
            text(format!("AI: {}", record.response)).size(14),
        ]
        .spacing(4),
    )
    .padding(10)
    .width(Length::Fill)
    .style(container::rounded_box)
    .into()
}

pub fn history(view: &HistoryView) -> Element<'_, Message> {
    let search = text_input("Search conversations...", view.query())
        .on_input(Message::SearchChanged)
        .padding(10)
        .size(14)
        .width(Length::Fixed(360.0));

    let controls: Element<Message> = if view.is_confirming() {
        row![
            text(CONFIRM_CLEAR).size(13),
            button(text("Clear").size(13))
                .on_press(Message::ClearConfirmed)
                .style(button::danger)
                .padding(8),
            button(text("Cancel").size(13))
                .on_press(Message::ClearDeclined)
                .style(button::secondary)
                .padding(8),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center)
        .into()
    } else {
        button(text("Clear All History").size(13))
            .on_press_maybe(view.can_clear().then_some(Message::ClearRequested))
            .style(button::danger)
            .padding(8)
            .into()
    };

    let mut content = column![
        text("Conversation History").size(26),
        text(format!(
            "Review your past interactions with Turbo AI. {} saved.",
            view.total()
        ))
        .size(14),
        row![search, horizontal_space(), controls].align_y(alignment::Vertical::Center),
    ]
    .spacing(15);

    if let Some(notice) = view.notice() {
        content = content.push(banner(notice));
    }

    let body: Element<Message> = match view.empty_state() {
        Some(state) => container(text(state.message()).size(14))
            .padding(20)
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .into(),
        None => scrollable(log(view.visible())).height(Length::Fill).into(),
    };

    content.push(body).into()
}

fn banner(notice: &Notice) -> Element<'_, Message> {
    let body: Element<Message> = match notice {
        Notice::Success(message) => text(message.as_str()).color(success()).into(),
        Notice::Failure { summary, detail } => {
            column![text(summary.as_str()).color(danger()), text(detail.as_str()).size(12)]
                .spacing(4)
                .into()
        }
    };

    container(
        row![
            body,
            horizontal_space(),
            button(text("Dismiss").size(12))
                .on_press(Message::DismissNotice)
                .style(button::text),
        ]
        .align_y(alignment::Vertical::Center),
    )
    .padding(10)
    .width(Length::Fill)
    .style(container::rounded_box)
    .into()
}
