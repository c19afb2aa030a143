use async_trait::async_trait;
use sigil_json_rpc::CallContext;
use sigil_protocol::ProtocolError;
use sigil_protocol::log_ui::{LogArg, LogLevel, LogUiInterface};
use tracing::{debug, error, info, warn};

/// Client log lines, forwarded into the service log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUiService;

#[async_trait]
impl LogUiInterface for LogUiService {
    async fn log(&self, ctx: CallContext, arg: LogArg) -> Result<(), ProtocolError> {
        if arg.text.is_empty() {
            return Err(ProtocolError::failed("empty log line"));
        }
        let session_id = arg.session_id;
        let connection_id = ctx.connection_id;
        match arg.level {
            LogLevel::Debug => debug!(%session_id, %connection_id, "{}", arg.text),
            LogLevel::Info | LogLevel::Notice => {
                info!(%session_id, %connection_id, "{}", arg.text)
            }
            LogLevel::Warn => warn!(%session_id, %connection_id, "{}", arg.text),
            LogLevel::Error | LogLevel::Critical => {
                error!(%session_id, %connection_id, level = ?arg.level, "{}", arg.text)
            }
        }
        Ok(())
    }
}
