use tower_sessions::Session;

pub const ID_TOKEN: &str = "id_token";
pub const JUST_SENT_MESSAGE: &str = "just_sent_message";
pub const MESSAGE_RECEIVER: &str = "message_receiver";
const FLASHES: &str = "flashes";

pub async fn flash(session: &Session, message: impl Into<String>) -> Result<(), tower_sessions::session::Error> {
    let mut flashes = session.get::<Vec<String>>(FLASHES).await?.unwrap_or_default();
    flashes.push(message.into());
    session.insert(FLASHES, flashes).await
}

/// Removes and returns every pending flash message.
pub async fn take_flashes(session: &Session) -> Result<Vec<String>, tower_sessions::session::Error> {
    Ok(session.remove::<Vec<String>>(FLASHES).await?.unwrap_or_default())
}

/// Consumes the one-shot "just sent a message" marker, returning the
/// receiver whose conversation should be reopened.
pub async fn take_sent_receiver(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    let just_sent = session.remove::<bool>(JUST_SENT_MESSAGE).await?.unwrap_or(false);
    let receiver = session.remove::<String>(MESSAGE_RECEIVER).await?;
    Ok(receiver.filter(|r| just_sent && !r.is_empty()))
}

pub async fn mark_sent(session: &Session, receiver: &str) -> Result<(), tower_sessions::session::Error> {
    session.insert(JUST_SENT_MESSAGE, true).await?;
    session.insert(MESSAGE_RECEIVER, receiver).await
}
