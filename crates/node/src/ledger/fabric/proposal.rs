use std::time::SystemTime;

use fabric_dashboard_proto::Message;
use fabric_dashboard_proto::common::{ChannelHeader, Header, HeaderType, SignatureHeader};
use fabric_dashboard_proto::protos::{
    ChaincodeHeaderExtension, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    ChaincodeProposalPayload, ChaincodeSpec, Proposal, SignedProposal,
};
use rand::Rng;
use sha2::{Digest, Sha256};

use super::signer::Signer;
use crate::ledger::LedgerError;

const NONCE_LEN: usize = 24;

/// A signed chaincode proposal and the transaction ID it commits to
pub(crate) struct SignedTransactionProposal {
    pub tx_id: String,
    pub proposal: SignedProposal,
}

/// `hex(sha256(nonce || creator))`
pub(crate) fn transaction_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

pub(crate) fn build_proposal(
    signer: &Signer,
    channel: &str,
    chaincode: &str,
    function: &str,
    args: &[String],
) -> Result<SignedTransactionProposal, LedgerError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce);
    let tx_id = transaction_id(&nonce, signer.creator());

    let chaincode_id = ChaincodeId { name: chaincode.to_string(), ..Default::default() };
    let channel_header = ChannelHeader {
        r#type: HeaderType::EndorserTransaction as i32,
        timestamp: Some(SystemTime::now().into()),
        channel_id: channel.to_string(),
        tx_id: tx_id.clone(),
        extension: ChaincodeHeaderExtension { chaincode_id: Some(chaincode_id.clone()) }
            .encode_to_vec(),
        ..Default::default()
    };
    let signature_header =
        SignatureHeader { creator: signer.creator().to_vec(), nonce: nonce.to_vec() };
    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: signature_header.encode_to_vec(),
    };

    let input = ChaincodeInput {
        args: std::iter::once(function)
            .chain(args.iter().map(String::as_str))
            .map(|arg| arg.as_bytes().to_vec())
            .collect(),
        ..Default::default()
    };
    let invocation = ChaincodeInvocationSpec {
        chaincode_spec: Some(ChaincodeSpec {
            chaincode_id: Some(chaincode_id),
            input: Some(input),
            ..Default::default()
        }),
    };
    let payload =
        ChaincodeProposalPayload { input: invocation.encode_to_vec(), ..Default::default() };

    let proposal_bytes = Proposal {
        header: header.encode_to_vec(),
        payload: payload.encode_to_vec(),
        extension: Vec::new(),
    }
    .encode_to_vec();
    let signature = signer.sign(&proposal_bytes)?;

    Ok(SignedTransactionProposal { tx_id, proposal: SignedProposal { proposal_bytes, signature } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_identity;

    #[test]
    fn test_transaction_id_derivation() {
        let nonce = [7u8; NONCE_LEN];
        let creator = b"creator";

        let mut concatenated = nonce.to_vec();
        concatenated.extend_from_slice(creator);
        assert_eq!(transaction_id(&nonce, creator), hex::encode(Sha256::digest(&concatenated)));
        assert_eq!(transaction_id(&nonce, creator).len(), 64);
    }

    #[test]
    fn test_proposal_contents() {
        let signer = Signer::from_identity(&test_identity("appUser")).unwrap();
        let args = vec!["asset7".to_string(), "red".to_string()];

        let signed = build_proposal(&signer, "mychannel", "basic", "CreateAsset", &args).unwrap();

        let proposal = Proposal::decode(signed.proposal.proposal_bytes.as_slice()).unwrap();
        let header = Header::decode(proposal.header.as_slice()).unwrap();
        let channel_header = ChannelHeader::decode(header.channel_header.as_slice()).unwrap();
        let signature_header =
            SignatureHeader::decode(header.signature_header.as_slice()).unwrap();

        assert_eq!(channel_header.channel_id, "mychannel");
        assert_eq!(channel_header.tx_id, signed.tx_id);
        assert_eq!(channel_header.r#type, HeaderType::EndorserTransaction as i32);
        assert_eq!(signature_header.nonce.len(), NONCE_LEN);
        assert_eq!(signed.tx_id, transaction_id(&signature_header.nonce, signer.creator()));

        let payload = ChaincodeProposalPayload::decode(proposal.payload.as_slice()).unwrap();
        let spec = ChaincodeInvocationSpec::decode(payload.input.as_slice())
            .unwrap()
            .chaincode_spec
            .unwrap();
        assert_eq!(spec.chaincode_id.unwrap().name, "basic");
        assert_eq!(
            spec.input.unwrap().args,
            [b"CreateAsset".to_vec(), b"asset7".to_vec(), b"red".to_vec()]
        );
    }

    #[test]
    fn test_fresh_nonce_per_proposal() {
        let signer = Signer::from_identity(&test_identity("appUser")).unwrap();

        let first = build_proposal(&signer, "mychannel", "basic", "GetAllAssets", &[]).unwrap();
        let second = build_proposal(&signer, "mychannel", "basic", "GetAllAssets", &[]).unwrap();
        assert_ne!(first.tx_id, second.tx_id);
    }
}
