//! Fabric Gateway client over gRPC.

mod proposal;
mod signer;

use fabric_dashboard_proto::Message;
use fabric_dashboard_proto::common::{Envelope, Payload};
use fabric_dashboard_proto::gateway::gateway_client::GatewayClient;
use fabric_dashboard_proto::gateway::{
    CommitStatusRequest, EndorseRequest, EvaluateRequest, SignedCommitStatusRequest,
    SubmitRequest,
};
use fabric_dashboard_proto::protos::{
    ChaincodeAction, ChaincodeActionPayload, ProposalResponsePayload, Transaction,
    TxValidationCode,
};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Uri};
use tracing::{debug, info};

use self::proposal::build_proposal;
use self::signer::Signer;
use super::{
    DiscoveryOptions, GatewayConnection, GatewayConnector, LedgerError, LedgerTimeouts, Phase,
};
use crate::identity::Identity;
use crate::profile::ConnectionProfile;

/// Chaincode responses at or above this status are errors
const ERROR_STATUS: i32 = 400;

/// Connects to the gateway peer named in a connection profile
#[derive(Debug, Clone, Default)]
pub struct FabricConnector {
    timeouts: LedgerTimeouts,
}

impl FabricConnector {
    pub fn new(timeouts: LedgerTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait::async_trait]
impl GatewayConnector for FabricConnector {
    #[tracing::instrument(skip_all, fields(operation = "ledger.connect", msp_id = %identity.msp_id))]
    async fn connect(
        &self,
        identity: &Identity,
        profile: &ConnectionProfile,
        discovery: DiscoveryOptions,
    ) -> Result<Box<dyn GatewayConnection>, LedgerError> {
        let signer = Signer::from_identity(identity)?;

        let (peer_name, peer) = profile.gateway_peer().ok_or_else(|| {
            LedgerError::ConnectFailed("connection profile lists no peers".to_string())
        })?;
        let target = GatewayTarget::resolve(&peer.url, peer.tls_domain(), discovery.as_localhost)?;

        let mut endpoint = Endpoint::from_shared(target.uri.clone())
            .map_err(|e| LedgerError::ConnectFailed(format!("{peer_name}: {e}")))?
            .connect_timeout(self.timeouts.connect);
        if target.tls {
            let pems = profile
                .tls_ca_pems(peer)
                .await
                .map_err(|e| LedgerError::ConnectFailed(format!("{peer_name}: {e}")))?;
            let tls = ClientTlsConfig::new()
                .domain_name(target.domain.clone())
                .ca_certificates(pems.into_iter().map(Certificate::from_pem));
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| LedgerError::ConnectFailed(format!("{peer_name}: {e}")))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| LedgerError::ConnectFailed(format!("{peer_name} at {}: {e}", target.uri)))?;
        info!(peer = peer_name, uri = %target.uri, "Connected to gateway peer");

        Ok(Box::new(FabricConnection {
            client: Some(GatewayClient::new(channel)),
            signer,
            pinned_endorsers: (!discovery.enabled).then(|| profile.clone()),
            timeouts: self.timeouts,
        }))
    }
}

/// Where and how to reach the gateway peer
#[derive(Debug, PartialEq, Eq)]
struct GatewayTarget {
    uri: String,
    tls: bool,
    /// Server name verified against the peer's TLS certificate
    domain: String,
}

impl GatewayTarget {
    /// Map a profile URL (`grpc://`, `grpcs://`) to a transport URI
    ///
    /// With `as_localhost` the host is replaced by `localhost` while the advertised name is kept
    /// for TLS verification.
    fn resolve(url: &str, tls_domain: Option<&str>, as_localhost: bool) -> Result<Self, LedgerError> {
        let invalid = |reason: &str| LedgerError::ConnectFailed(format!("peer url {url}: {reason}"));

        let uri = url.parse::<Uri>().map_err(|e| invalid(&e.to_string()))?;
        let tls = match uri.scheme_str() {
            Some("grpcs" | "https") => true,
            Some("grpc" | "http") => false,
            Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme")),
        };
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;

        let domain = tls_domain.unwrap_or(host).to_string();
        let host = if as_localhost { "localhost" } else { host };
        let scheme = if tls { "https" } else { "http" };
        let uri = match uri.port_u16() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        };

        Ok(Self { uri, tls, domain })
    }
}

/// Open gateway connection signing as one identity
pub struct FabricConnection {
    client: Option<GatewayClient<Channel>>,
    signer: Signer,
    /// Profile used to pin endorsing organizations when discovery is off
    pinned_endorsers: Option<ConnectionProfile>,
    timeouts: LedgerTimeouts,
}

impl FabricConnection {
    fn client(&self) -> Result<GatewayClient<Channel>, LedgerError> {
        self.client
            .clone()
            .ok_or_else(|| LedgerError::ConnectFailed("connection closed".to_string()))
    }

    fn endorsing_organizations(&self, channel: &str) -> Vec<String> {
        self.pinned_endorsers
            .as_ref()
            .map(|profile| profile.endorsing_msp_ids(channel))
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl GatewayConnection for FabricConnection {
    async fn evaluate(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError> {
        let mut client = self.client()?;
        let signed = build_proposal(&self.signer, channel, chaincode, function, args)?;

        let mut request = tonic::Request::new(EvaluateRequest {
            transaction_id: signed.tx_id,
            channel_id: channel.to_string(),
            proposed_transaction: Some(signed.proposal),
            target_organizations: Vec::new(),
        });
        request.set_timeout(self.timeouts.evaluate);

        let response = client
            .evaluate(request)
            .await
            .map_err(|status| LedgerError::from_status(Phase::Evaluate, &status))?
            .into_inner();
        let result = response.result.ok_or_else(|| {
            LedgerError::EndorsementFailed("evaluate: empty response".to_string())
        })?;
        if result.status >= ERROR_STATUS {
            return Err(LedgerError::EndorsementFailed(format!(
                "evaluate: chaincode status {}: {}",
                result.status, result.message
            )));
        }

        Ok(result.payload)
    }

    async fn submit(
        &self,
        channel: &str,
        chaincode: &str,
        function: &str,
        args: &[String],
    ) -> Result<Vec<u8>, LedgerError> {
        let mut client = self.client()?;
        let signed = build_proposal(&self.signer, channel, chaincode, function, args)?;
        let tx_id = signed.tx_id;

        let mut endorse = tonic::Request::new(EndorseRequest {
            transaction_id: tx_id.clone(),
            channel_id: channel.to_string(),
            proposed_transaction: Some(signed.proposal),
            endorsing_organizations: self.endorsing_organizations(channel),
        });
        endorse.set_timeout(self.timeouts.endorse);
        let prepared = client
            .endorse(endorse)
            .await
            .map_err(|status| LedgerError::from_status(Phase::Endorse, &status))?
            .into_inner()
            .prepared_transaction
            .ok_or_else(|| {
                LedgerError::EndorsementFailed("endorse: no prepared transaction".to_string())
            })?;
        let result = chaincode_result(&prepared.payload)?;
        debug!(%tx_id, "Transaction endorsed");

        let envelope = Envelope {
            signature: self.signer.sign(&prepared.payload)?,
            payload: prepared.payload,
        };
        let mut submit = tonic::Request::new(SubmitRequest {
            transaction_id: tx_id.clone(),
            channel_id: channel.to_string(),
            prepared_transaction: Some(envelope),
        });
        submit.set_timeout(self.timeouts.submit);
        client
            .submit(submit)
            .await
            .map_err(|status| LedgerError::from_status(Phase::Submit, &status))?;

        let status_request = CommitStatusRequest {
            transaction_id: tx_id.clone(),
            channel_id: channel.to_string(),
            identity: self.signer.creator().to_vec(),
        }
        .encode_to_vec();
        let mut commit_status = tonic::Request::new(SignedCommitStatusRequest {
            signature: self.signer.sign(&status_request)?,
            request: status_request,
        });
        commit_status.set_timeout(self.timeouts.commit_status);
        let status = client
            .commit_status(commit_status)
            .await
            .map_err(|status| LedgerError::from_status(Phase::CommitStatus, &status))?
            .into_inner();

        if status.result != TxValidationCode::Valid as i32 {
            let code = TxValidationCode::try_from(status.result)
                .map_or_else(|_| status.result.to_string(), |code| code.as_str_name().to_string());
            return Err(LedgerError::CommitFailed(format!(
                "transaction {tx_id} invalid in block {}: {code}",
                status.block_number
            )));
        }
        info!(%tx_id, block = status.block_number, "Transaction committed");

        Ok(result)
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Gateway connection closed");
        }
    }
}

/// Chaincode result carried by a prepared transaction envelope payload
fn chaincode_result(payload: &[u8]) -> Result<Vec<u8>, LedgerError> {
    fn malformed(what: &str, err: impl std::fmt::Display) -> LedgerError {
        LedgerError::EndorsementFailed(format!("malformed prepared transaction {what}: {err}"))
    }

    let payload = Payload::decode(payload).map_err(|e| malformed("payload", e))?;
    let transaction =
        Transaction::decode(payload.data.as_slice()).map_err(|e| malformed("transaction", e))?;
    let action = transaction
        .actions
        .first()
        .ok_or_else(|| malformed("transaction", "no actions"))?;
    let action_payload = ChaincodeActionPayload::decode(action.payload.as_slice())
        .map_err(|e| malformed("action payload", e))?;
    let endorsed = action_payload
        .action
        .ok_or_else(|| malformed("action payload", "no endorsed action"))?;
    let response_payload =
        ProposalResponsePayload::decode(endorsed.proposal_response_payload.as_slice())
            .map_err(|e| malformed("proposal response", e))?;
    let chaincode_action = ChaincodeAction::decode(response_payload.extension.as_slice())
        .map_err(|e| malformed("chaincode action", e))?;

    Ok(chaincode_action.response.map(|response| response.payload).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use fabric_dashboard_proto::protos::{
        ChaincodeEndorsedAction, Response, TransactionAction,
    };

    use super::*;

    #[test]
    fn test_tls_target_as_localhost() {
        let target = GatewayTarget::resolve(
            "grpcs://peer0.org1.example.com:7051",
            Some("peer0.org1.example.com"),
            true,
        )
        .unwrap();

        assert_eq!(
            target,
            GatewayTarget {
                uri: "https://localhost:7051".to_string(),
                tls: true,
                domain: "peer0.org1.example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_plain_target_keeps_host() {
        let target = GatewayTarget::resolve("grpc://peer0.org2.example.com:9051", None, false).unwrap();

        assert_eq!(target.uri, "http://peer0.org2.example.com:9051");
        assert!(!target.tls);
        assert_eq!(target.domain, "peer0.org2.example.com");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = GatewayTarget::resolve("ftp://peer0:7051", None, true).unwrap_err();
        assert!(matches!(err, LedgerError::ConnectFailed(_)));
    }

    fn prepared_payload(result: &[u8]) -> Vec<u8> {
        let chaincode_action = ChaincodeAction {
            response: Some(Response { status: 200, payload: result.to_vec(), ..Default::default() }),
            ..Default::default()
        };
        let response_payload = ProposalResponsePayload {
            proposal_hash: vec![1, 2, 3],
            extension: chaincode_action.encode_to_vec(),
        };
        let action_payload = ChaincodeActionPayload {
            action: Some(ChaincodeEndorsedAction {
                proposal_response_payload: response_payload.encode_to_vec(),
                endorsements: Vec::new(),
            }),
            ..Default::default()
        };
        let transaction = Transaction {
            actions: vec![TransactionAction {
                header: Vec::new(),
                payload: action_payload.encode_to_vec(),
            }],
        };
        Payload { header: None, data: transaction.encode_to_vec() }.encode_to_vec()
    }

    #[test]
    fn test_chaincode_result_from_prepared_transaction() {
        let payload = prepared_payload(br#"{"ID":"asset7"}"#);
        assert_eq!(chaincode_result(&payload).unwrap(), br#"{"ID":"asset7"}"#.to_vec());
    }

    #[test]
    fn test_chaincode_result_without_actions() {
        let payload = Payload {
            header: None,
            data: Transaction { actions: Vec::new() }.encode_to_vec(),
        }
        .encode_to_vec();

        let err = chaincode_result(&payload).unwrap_err();
        assert!(matches!(err, LedgerError::EndorsementFailed(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_a_peer() {
        let profile = ConnectionProfile::from_yaml("name: empty\n").unwrap();
        let identity = crate::test_utils::test_identity("appUser");

        let err = FabricConnector::default()
            .connect(&identity, &profile, DiscoveryOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::ConnectFailed(_)));
    }
}
