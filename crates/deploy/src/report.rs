//! Human-readable summaries of deployment runs.

use alloy_core::primitives::Address;
use comfy_table::{Table, presets::UTF8_FULL};

use crate::{contracts::PoolState, sequencer::DeploymentRecord};

/// One row per pool: name, address, status.
pub fn records_table(records: &[DeploymentRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Pool", "Address", "Status"]);

    for record in records {
        table.add_row(vec![
            record.pool_name.clone(),
            record.contract_address.to_string(),
            record.status.to_string(),
        ]);
    }
    table
}

/// Pools registered in a factory, with their on-chain configuration.
pub fn pools_table(pools: &[(Address, PoolState)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "#",
        "Name",
        "Address",
        "Token",
        "Min stake",
        "Max stake",
        "Max pool",
        "Cool-off (s)",
        "Interest",
    ]);

    for (index, (address, state)) in pools.iter().enumerate() {
        table.add_row(vec![
            index.to_string(),
            state.pool_name.clone(),
            address.to_string(),
            state.staking_token.to_string(),
            state.min_stake_amount.to_string(),
            state.max_stake_amount.to_string(),
            state.max_pool_amount.to_string(),
            state.cool_off.to_string(),
            state.interest.to_string(),
        ]);
    }
    table
}

/// Compact form of a nonce sequence, e.g. `4..=9`.
pub fn nonce_range(nonces: &[u64]) -> String {
    match (nonces.first(), nonces.last()) {
        (Some(first), Some(last)) if first == last => first.to_string(),
        (Some(first), Some(last)) => format!("{first}..={last}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::B256;

    use super::*;
    use crate::sequencer::PoolStatus;

    #[test]
    fn test_records_table_lists_every_pool() {
        let records = vec![
            DeploymentRecord {
                pool_name: "CGO Staking Pool B".to_string(),
                contract_address: Address::repeat_byte(0x01),
                status: PoolStatus::Deployed,
                create_tx: B256::ZERO,
                initialize_tx: Some(B256::ZERO),
            },
            DeploymentRecord {
                pool_name: "FXD Growth Pool".to_string(),
                contract_address: Address::repeat_byte(0x02),
                status: PoolStatus::Failed,
                create_tx: B256::ZERO,
                initialize_tx: None,
            },
        ];

        let rendered = records_table(&records).to_string();
        assert!(rendered.contains("CGO Staking Pool B"));
        assert!(rendered.contains("deployed"));
        assert!(rendered.contains("failed"));
        assert!(rendered.contains(&Address::repeat_byte(0x02).to_string()));
    }

    #[test]
    fn test_nonce_range() {
        assert_eq!(nonce_range(&[]), "-");
        assert_eq!(nonce_range(&[7]), "7");
        assert_eq!(nonce_range(&[4, 5, 6]), "4..=6");
    }
}
