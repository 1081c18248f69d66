//! Publish gating: a campaign goes live only at a compliance score of 100.

use crate::backend::AuditBackend;
use crate::effect::Effect;
use crate::engine::ComplianceEngine;
use crate::error::EngineError;
use setsync_client::PublishReceipt;

/// The score a campaign must reach before it can be published.
pub const CERTIFIED_SCORE: u8 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishGate;

impl PublishGate {
    pub fn can_publish(score: u8) -> bool {
        score == CERTIFIED_SCORE
    }

    pub fn check(score: u8) -> Result<(), EngineError> {
        if Self::can_publish(score) {
            Ok(())
        } else {
            Err(EngineError::CertificationRequired { score })
        }
    }
}

impl<B: AuditBackend> ComplianceEngine<B> {
    pub fn can_publish(&self) -> bool {
        PublishGate::can_publish(self.compliance_score())
    }

    /// Publish the campaign.
    ///
    /// Fails with [`EngineError::CertificationRequired`] without contacting
    /// the backend unless the score is 100. Backend rejections are returned
    /// with the server's message.
    pub async fn publish(&self) -> Result<PublishReceipt, EngineError> {
        PublishGate::check(self.compliance_score())?;
        let (_, campaign_name) = self.session()?;

        let backend = &self.inner.backend;
        let receipt = self
            .call(backend.publish_endpoint(), backend.publish(&campaign_name))
            .await?;
        tracing::info!(campaign = %campaign_name, "campaign published");
        self.emit(&[Effect::Announce {
            message: receipt.display_message().to_string(),
        }]);
        Ok(receipt)
    }
}
