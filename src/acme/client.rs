//! ACME protocol client (HTTP-01 only).

use std::future::Future;
use std::time::Duration;

use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};

use crate::acme::challenge::ChallengeStore;
use crate::acme::storage::{CertificateCache, IssuedCertificate};
use crate::acme::AcmeError;

/// Order polls before giving up; with doubling delays this is a few minutes.
const MAX_ORDER_POLLS: u32 = 10;
const INITIAL_POLL_DELAY: Duration = Duration::from_millis(250);
const MAX_POLL_DELAY: Duration = Duration::from_secs(30);

/// An ACME account plus the challenge store its orders publish tokens to.
pub struct AcmeClient {
    account: Account,
    challenges: ChallengeStore,
}

impl AcmeClient {
    /// Load the cached account for `directory_url`, registering a new one if absent.
    pub async fn connect(
        directory_url: &str,
        contact_email: Option<&str>,
        cache: &CertificateCache,
        challenges: ChallengeStore,
    ) -> Result<Self, AcmeError> {
        let account = match cache.load_account(directory_url).await? {
            Some(credentials) => {
                tracing::debug!(directory = %directory_url, "Using cached ACME account");
                Account::from_credentials(credentials).await?
            }
            None => {
                let contact_uri = contact_email.map(|email| format!("mailto:{email}"));
                let contact: Vec<&str> = contact_uri.iter().map(String::as_str).collect();
                let (account, credentials) = Account::create(
                    &NewAccount {
                        contact: &contact,
                        terms_of_service_agreed: true,
                        only_return_existing: false,
                    },
                    directory_url,
                    None,
                )
                .await?;
                cache.store_account(directory_url, &credentials).await?;
                tracing::info!(directory = %directory_url, "Registered ACME account");
                account
            }
        };
        Ok(Self { account, challenges })
    }

    /// Run a complete order for `domain` and return the issued certificate.
    pub async fn issue(&self, domain: &str) -> Result<IssuedCertificate, AcmeError> {
        let identifiers = [Identifier::Dns(domain.to_string())];
        let mut order = self
            .account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        let mut published = Vec::new();
        let result = self.authorize(&mut order, &mut published).await;
        let result = match result {
            Ok(()) => finalize(&mut order, domain).await,
            Err(e) => Err(e),
        };
        for token in &published {
            self.challenges.remove(token);
        }
        result
    }

    /// Publish a token for every pending authorization and mark it ready.
    async fn authorize(&self, order: &mut Order, published: &mut Vec<String>) -> Result<(), AcmeError> {
        let authorizations = order.authorizations().await?;
        for authorization in &authorizations {
            match &authorization.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                status => return Err(AcmeError::Authorization(format!("{status:?}"))),
            }

            let challenge = authorization
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Http01)
                .ok_or(AcmeError::NoHttpChallenge)?;

            let key_authorization = order.key_authorization(challenge);
            self.challenges.insert(&challenge.token, key_authorization.as_str());
            published.push(challenge.token.clone());
            order.set_challenge_ready(&challenge.url).await?;
        }
        Ok(())
    }
}

/// Wait for validation, submit a CSR and download the chain.
async fn finalize(order: &mut Order, domain: &str) -> Result<IssuedCertificate, AcmeError> {
    let mut delay = INITIAL_POLL_DELAY;
    let mut polls = 0;
    let status = loop {
        tokio::time::sleep(delay).await;
        let state = order.refresh().await?;
        match state.status {
            OrderStatus::Ready | OrderStatus::Valid | OrderStatus::Invalid => break state.status,
            _ => {}
        }
        polls += 1;
        if polls >= MAX_ORDER_POLLS {
            return Err(AcmeError::Timeout);
        }
        delay = (delay * 2).min(MAX_POLL_DELAY);
    };

    if status != OrderStatus::Ready {
        return Err(AcmeError::OrderNotReady(format!("{status:?}")));
    }

    let key_pair = KeyPair::generate()?;
    let mut params = CertificateParams::new(vec![domain.to_string()])?;
    params.distinguished_name = DistinguishedName::new();
    let csr = params.serialize_request(&key_pair)?;
    order.finalize(csr.der()).await?;

    let chain_pem = download_chain(order).await?;

    Ok(IssuedCertificate {
        chain_pem,
        key_pem: key_pair.serialize_pem(),
    })
}

/// Where an issued certificate chain is fetched from once the order is finalized.
trait ChainSource {
    fn poll_chain(&mut self) -> impl Future<Output = Result<Option<String>, AcmeError>> + Send;
}

impl ChainSource for Order {
    async fn poll_chain(&mut self) -> Result<Option<String>, AcmeError> {
        Ok(self.certificate().await?)
    }
}

/// Poll for the issued chain within the same budget as order validation.
async fn download_chain(source: &mut impl ChainSource) -> Result<String, AcmeError> {
    let mut delay = INITIAL_POLL_DELAY;
    for _ in 0..MAX_ORDER_POLLS {
        if let Some(chain) = source.poll_chain().await? {
            return Ok(chain);
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_POLL_DELAY);
    }
    Err(AcmeError::Timeout)
}
