/*!
 * # Spreadwatch - Cross-Venue Spread Scanner
 *
 * Spreadwatch scans configured token scenarios for price spreads between
 * centralized exchanges and on-chain aggregators, and reports the ones that
 * survive a second, independent quote.
 *
 * ## Core Features
 *
 * - **Identity Scheduling**: Spreads venue requests over a pool of proxies under per-venue quotas
 * - **Best Execution**: Quotes every candidate venue of a leg concurrently and keeps the best
 * - **Load Balancing**: Assigns scenarios to identities by estimated request weight
 * - **Confirmation**: Re-quotes every profitable cycle before reporting it
 *
 * ## Module Structure
 *
 * - `engine`: Scheduler, resilience wrapper, search, balancer and arbitrage cycle
 * - `venues`: Venue adapter contract and registry
 * - `store`: Scenario and proxy files, proxy liveness
 * - `notify`: Alert and log delivery
 * - `bot`: The scan loop
 * - `config`: Configuration from the environment
 * - `utils`: Logger and application context
 */

/// The scan loop
pub mod bot;
/// Configuration from the environment
pub mod config;
/// Rate-limited execution engine
pub mod engine;
/// Alert and log delivery
pub mod notify;
/// Scenario and proxy files
pub mod store;
/// Logger and application context
pub mod utils;
/// Venue adapters
pub mod venues;
