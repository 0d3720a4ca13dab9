use tertulia_core::config::AppConfig;

/// Read-only values the dialogs need besides service handles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSettings {
    pub oauth_connection_name: String,
    pub card_channel: String,
    pub bot_account_id: String,
    pub forex_pair: String,
    pub forex_source_url: String,
    pub translation_targets: Vec<String>,
    pub face_person_group_id: String,
    pub face_person_id: String,
    pub face_person_name: String,
    pub storage_table: String,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for TaskSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            oauth_connection_name: config.channel.oauth_connection_name.clone(),
            card_channel: config.channel.card_channel.clone(),
            bot_account_id: config.channel.bot_account_id.clone(),
            forex_pair: config.forex.pair.clone(),
            forex_source_url: config.forex.source_url.clone().unwrap_or_default(),
            translation_targets: config.translator.targets.clone(),
            face_person_group_id: config.face.person_group_id.clone().unwrap_or_default(),
            face_person_id: config.face.person_id.clone().unwrap_or_default(),
            face_person_name: config.face.person_name.clone(),
            storage_table: config.storage.table.clone(),
        }
    }
}

impl TaskSettings {
    /// Rich cards go to the card channel unless the sender is the bot's own demo account.
    pub fn wants_card(&self, channel_id: &str, sender_id: &str) -> bool {
        channel_id == self.card_channel && sender_id != self.bot_account_id
    }
}
