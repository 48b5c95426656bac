//! Purchase side of the saga: token issuing and cart completion.

use std::sync::Arc;

use async_trait::async_trait;
use messaging::{MessageHandler, Publisher};
use saga::{Command, CommandType, Purchase, Reply, ReplyType};

use crate::error::Result;
use crate::models::NewPurchaseToken;
use crate::repository::{CartRepository, TokenRepository};

/// Answers `IssueTokens` and `CompletePurchase` commands.
pub struct PurchaseCommandHandler<T, C> {
    tokens: T,
    carts: C,
    replies: Arc<dyn Publisher<Reply>>,
}

impl<T: TokenRepository, C: CartRepository> PurchaseCommandHandler<T, C> {
    pub fn new(tokens: T, carts: C, replies: Arc<dyn Publisher<Reply>>) -> Self {
        Self {
            tokens,
            carts,
            replies,
        }
    }

    /// Runs a command and builds the reply; foreign commands give
    /// `UnknownReply`, which is never published.
    #[tracing::instrument(skip(self, command), fields(purchase_id = %command.purchase.purchase_id, command = %command.kind))]
    pub async fn process(&self, command: Command) -> Reply {
        let Command { purchase, kind } = command;
        match kind {
            CommandType::IssueTokens => match self.issue_tokens(&purchase).await {
                Ok(issued) => {
                    tracing::info!(issued, "tokens issued");
                    Reply::new(ReplyType::TokensIssued, purchase)
                }
                Err(error) => {
                    tracing::error!(%error, "failed to issue tokens");
                    Reply::new(ReplyType::TokensNotIssued, purchase).with_message(error.to_string())
                }
            },
            CommandType::CompletePurchase => {
                if let Err(error) = self.carts.clear_cart(purchase.cart_id).await {
                    // The seats and tokens are already taken; a stale cart
                    // does not undo the purchase.
                    tracing::error!(cart_id = %purchase.cart_id, %error, "failed to clear cart");
                }
                tracing::info!("purchase completed");
                Reply::new(ReplyType::PurchaseCompleted, purchase)
            }
            _ => Reply::new(ReplyType::UnknownReply, purchase),
        }
    }

    /// Mints one token per purchased seat, `max(quantity, 1)` per item.
    ///
    /// Stops at the first storage failure; tokens stored before it stay.
    async fn issue_tokens(&self, purchase: &Purchase) -> Result<usize> {
        let mut issued = 0;
        for item in &purchase.items {
            for _ in 0..item.quantity.max(1) {
                let token = NewPurchaseToken::mint(purchase.tourist_id, item.tour_id);
                self.tokens.create_token(token).await?;
                issued += 1;
                metrics::counter!("purchase_tokens_issued_total").increment(1);
            }
        }
        Ok(issued)
    }
}

#[async_trait]
impl<T, C> MessageHandler for PurchaseCommandHandler<T, C>
where
    T: TokenRepository + 'static,
    C: CartRepository + 'static,
{
    type Message = Command;

    async fn handle(&self, command: Command) {
        let reply = self.process(command).await;
        if reply.kind == ReplyType::UnknownReply {
            return;
        }
        if let Err(error) = self.replies.publish(&reply).await {
            tracing::error!(purchase_id = %reply.purchase.purchase_id, reply = %reply.kind, %error, "failed to publish reply");
        }
    }
}
