use crate::models::{Locators, PersonalizationProfile, SiteFlag, SiteProfile};

pub const DEFAULT_SITE: &str = "CHATAPP";
pub const DEFAULT_PERSON: &str = "PY_SENIOR";

pub fn sites() -> Vec<SiteProfile> {
    vec![
        // Needs a working VPN from most networks.
        SiteProfile::new(
            "OPENAI",
            "https://chatgpt.com/",
            Locators {
                text_input: Some("//div[@id='prompt-textarea']".into()),
                send_button: Some("//button[@data-testid='send-button']".into()),
                stop_button: Some("//button[@data-testid='stop-button']".into()),
                reply_message: Some("//div[@data-message-author-role='assistant']".into()),
                consent_dialog: Some("//div[@role='dialog']".into()),
                ..Default::default()
            },
        ),
        SiteProfile::new(
            "CHATAPP",
            "https://chatgptchatapp.com/ru",
            Locators {
                text_input: Some("//textarea[@id='chat-input']".into()),
                send_button: Some("//button[@class='btn-send-message']".into()),
                stop_button: Some("//button[@class='btn-stop-response']".into()),
                reply_message: Some(
                    "//div[@class='chat-box ai-completed']//div[@class='message-completed']".into(),
                ),
                reply_error: Some(
                    "//div[@class='chat-box ai-completed']//div[contains(@class, 'message-error')]"
                        .into(),
                ),
                new_chat_button: Some("//button[contains(@class, 'btn-new-chat')]".into()),
                ..Default::default()
            },
        )
        .with_flag(SiteFlag::StartNewChatOnOpen),
        SiteProfile::new(
            "BLACKBOX",
            "https://www.blackbox.ai/",
            Locators {
                text_input: Some("//textarea[@id='chat-input-box']".into()),
                send_button: Some(
                    "//button[(@type='submit') and (contains(@style, 'margin-right')) and (./span[@class='md:flex'])]"
                        .into(),
                ),
                stop_button: Some(
                    "//button[not(@type='submit') and (contains(@style, 'margin-right')) and (./span[@class='md:flex'])]"
                        .into(),
                ),
                reply_message: Some("//div[contains(@class, 'prose break-words')]".into()),
                ..Default::default()
            },
        ),
    ]
}

pub fn persons() -> Vec<PersonalizationProfile> {
    let developer = |name: &str, length: u32, tone: &str, task: &str| PersonalizationProfile {
        name: name.to_string(),
        user_name: Some("Даниил".to_string()),
        user_role: Some("Программист Python".to_string()),
        max_reply_length: Some(length),
        assistant_tone: Some(tone.to_string()),
        assistant_task: Some(task.to_string()),
    };

    vec![
        developer(
            "PY_SENIOR",
            100,
            "Строгий старший программист",
            "Помогать советами и подсказывать идеи реализации",
        ),
        developer(
            "DUMB",
            100,
            "Робот, который отвечает только 'i am dumb'",
            "Строго отвечать 'i am dumb' в любом сообщении, без лишних слов",
        ),
        developer(
            "HTML_FORMATTER",
            1000,
            "Робот преобразователь текста в HTML код",
            "Преобразовать текст в HTML код и отправить только его.",
        ),
    ]
}
