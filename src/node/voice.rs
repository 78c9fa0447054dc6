use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::{error::JoinError, Songbird};
use tracing::{debug, info};

use super::VoiceConnector;
use crate::error::{Error, Result};

#[async_trait]
impl VoiceConnector for Songbird {
    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        match self.remove(guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            // Ya no había conexión: nada que cerrar
            Err(JoinError::NoCall) => {
                debug!("Sin conexión de voz en guild {}", guild_id);
                Ok(())
            }
            Err(e) => Err(Error::Voice(e.to_string())),
        }
    }
}
