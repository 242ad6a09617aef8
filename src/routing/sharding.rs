use std::collections::HashMap;

use thiserror::Error;

use super::{Shard, ShardCount, Token};

/// The only partitioner the biased-token-round-robin shard mapping is defined for.
const SUPPORTED_PARTITIONER: &str = "org.apache.cassandra.dht.Murmur3Partitioner";
const SUPPORTED_SHARDING_ALGORITHM: &str = "biased-token-round-robin";

const SHARD_ENTRY: &str = "SCYLLA_SHARD";
const NR_SHARDS_ENTRY: &str = "SCYLLA_NR_SHARDS";
const PARTITIONER_ENTRY: &str = "SCYLLA_PARTITIONER";
const SHARDING_ALGORITHM_ENTRY: &str = "SCYLLA_SHARDING_ALGORITHM";
const MSB_IGNORE_ENTRY: &str = "SCYLLA_SHARDING_IGNORE_MSB";
const SHARD_AWARE_PORT_ENTRY: &str = "SCYLLA_SHARD_AWARE_PORT";
const SHARD_AWARE_PORT_SSL_ENTRY: &str = "SCYLLA_SHARD_AWARE_PORT_SSL";

/// Sharding parameters of a single host, learned from the SUPPORTED options
/// of a freshly established connection. Fixed for the lifetime of a pool.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ShardingInfo {
    pub nr_shards: ShardCount,
    pub msb_ignore: u8,
    /// Port routing incoming cleartext connections to shard
    /// `source_port % nr_shards`, if the host advertises one.
    pub shard_aware_port: Option<u16>,
    /// Same as [`ShardingInfo::shard_aware_port`], but for TLS connections.
    pub shard_aware_port_ssl: Option<u16>,
}

/// Sharding info together with the shard assigned to the connection
/// that delivered it.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ConnectionShardingInfo {
    pub shard: Shard,
    pub sharding: ShardingInfo,
}

impl ShardingInfo {
    #[inline]
    pub fn new(
        nr_shards: ShardCount,
        msb_ignore: u8,
        shard_aware_port: Option<u16>,
        shard_aware_port_ssl: Option<u16>,
    ) -> Self {
        ShardingInfo {
            nr_shards,
            msb_ignore,
            shard_aware_port,
            shard_aware_port_ssl,
        }
    }

    /// Computes the shard that owns the given token.
    ///
    /// The token is reinterpreted as an unsigned 64-bit value biased by
    /// 2^63, the `msb_ignore` most significant bits are shifted out, and the
    /// result is scaled to `[0, nr_shards)`. All arithmetic wraps.
    #[inline]
    pub fn shard_of(&self, token: Token) -> Shard {
        let mut biased_token = (token.value as u64).wrapping_add(1u64 << 63);
        biased_token <<= self.msb_ignore;
        (((biased_token as u128) * (self.nr_shards.get() as u128)) >> 64) as Shard
    }

    /// The advertised shard-aware port applicable to the given connection kind.
    #[inline]
    pub fn shard_aware_port(&self, tls: bool) -> Option<u16> {
        if tls {
            self.shard_aware_port_ssl
        } else {
            self.shard_aware_port
        }
    }

    /// Parses sharding information out of the SUPPORTED options multimap.
    ///
    /// Keys are case-sensitive and required values must be single-valued.
    /// An unknown partitioner or sharding algorithm disables shard awareness
    /// for the host, which callers express by treating the error as "no
    /// sharding".
    pub fn parse(
        options: &HashMap<String, Vec<String>>,
    ) -> Result<ConnectionShardingInfo, ShardingError> {
        let shard_entry = options.get(SHARD_ENTRY);
        let nr_shards_entry = options.get(NR_SHARDS_ENTRY);
        let partitioner_entry = options.get(PARTITIONER_ENTRY);
        let algorithm_entry = options.get(SHARDING_ALGORITHM_ENTRY);
        let msb_ignore_entry = options.get(MSB_IGNORE_ENTRY);

        let (shard_entry, nr_shards_entry, partitioner_entry, algorithm_entry, msb_ignore_entry) =
            match (
                shard_entry,
                nr_shards_entry,
                partitioner_entry,
                algorithm_entry,
                msb_ignore_entry,
            ) {
                (Some(shard), Some(nr_shards), Some(partitioner), Some(algorithm), Some(msb)) => {
                    (shard, nr_shards, partitioner, algorithm, msb)
                }
                // No parameter present at all - not a sharded host.
                (None, None, None, None, None) => return Err(ShardingError::NoShardInfo),
                _ => return Err(ShardingError::MissingSomeShardInfoParameters),
            };

        let (
            Some(shard_entry),
            Some(nr_shards_entry),
            Some(partitioner_entry),
            Some(algorithm_entry),
            Some(msb_ignore_entry),
        ) = (
            single_value(shard_entry),
            single_value(nr_shards_entry),
            single_value(partitioner_entry),
            single_value(algorithm_entry),
            single_value(msb_ignore_entry),
        )
        else {
            return Err(ShardingError::MissingShardInfoParameterValues);
        };

        if partitioner_entry != SUPPORTED_PARTITIONER {
            return Err(ShardingError::UnsupportedPartitioner(
                partitioner_entry.to_owned(),
            ));
        }
        if algorithm_entry != SUPPORTED_SHARDING_ALGORITHM {
            return Err(ShardingError::UnsupportedShardingAlgorithm(
                algorithm_entry.to_owned(),
            ));
        }

        let shard = shard_entry.parse::<u16>()? as Shard;
        let nr_shards = nr_shards_entry.parse::<u16>()?;
        let nr_shards = ShardCount::new(nr_shards).ok_or(ShardingError::ZeroShards)?;
        let msb_ignore = msb_ignore_entry.parse::<u8>()?;

        // The shard-aware ports are optional. A malformed entry is treated
        // as an absent one, which merely disables port-based targeting.
        let shard_aware_port = parse_optional_port(options, SHARD_AWARE_PORT_ENTRY);
        let shard_aware_port_ssl = parse_optional_port(options, SHARD_AWARE_PORT_SSL_ENTRY);

        Ok(ConnectionShardingInfo {
            shard,
            sharding: ShardingInfo::new(nr_shards, msb_ignore, shard_aware_port, shard_aware_port_ssl),
        })
    }
}

fn single_value(values: &[String]) -> Option<&str> {
    match values {
        [value] => Some(value.as_str()),
        _ => None,
    }
}

fn parse_optional_port(options: &HashMap<String, Vec<String>>, key: &str) -> Option<u16> {
    options
        .get(key)
        .and_then(|values| single_value(values))
        .and_then(|value| value.parse::<u16>().ok())
}

/// Reason why the SUPPORTED options did not yield usable sharding info.
#[derive(Clone, Error, Debug)]
#[non_exhaustive]
pub enum ShardingError {
    /// The host did not provide any sharding information. Most likely a host
    /// that does not shard its state at all.
    #[error("Host did not provide any sharding information")]
    NoShardInfo,

    /// Some of the parameters are present, while others are missing.
    #[error("Missing some sharding info parameters")]
    MissingSomeShardInfoParameters,

    /// All parameters are present, but some do not contain exactly one value.
    #[error("Missing some sharding info parameter values")]
    MissingShardInfoParameterValues,

    /// The host advertises a partitioner the shard mapping is not defined for.
    #[error("Unsupported partitioner: {0}")]
    UnsupportedPartitioner(String),

    /// The host advertises an unknown sharding algorithm.
    #[error("Unsupported sharding algorithm: {0}")]
    UnsupportedShardingAlgorithm(String),

    /// Number of shards is equal to zero.
    #[error("Sharding info contains an invalid number of shards (0)")]
    ZeroShards,

    /// Failed to parse a numeric parameter.
    #[error("Failed to parse a sharding info parameter's value: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),
}
