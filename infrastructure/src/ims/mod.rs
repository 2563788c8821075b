//! IMS SOAP adapter
//!
//! Implements ImsGateway over the IMS web services (`*.asmx`), including the
//! `DataAccess.ExecuteDataSet` stored-procedure surface.

pub mod client;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod token_cache;
pub mod transport;
