// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::datasource::{
    complex_mapping_source, fallback_source_for, final_data_source, initial_source_for,
    source_member_data_source, DataSource, DataSourceSet,
};
use crate::dictionary::DictionaryDataSourceFactory;
use crate::member::{best_source_match, MemberMapperData};
use crate::shape::Classification;

use std::rc::Rc;

use log::debug;

/// A data source whose applicability depends on the source container's
/// runtime shape rather than static member matching.
pub trait MapTimeDataSourceFactory {
    fn is_for(&self, data: &MemberMapperData) -> bool;
    fn create(&self, data: &MemberMapperData) -> DataSource;
}

impl MapTimeDataSourceFactory for DictionaryDataSourceFactory {
    fn is_for(&self, data: &MemberMapperData) -> bool {
        DictionaryDataSourceFactory::is_for(self, data)
    }

    fn create(&self, data: &MemberMapperData) -> DataSource {
        DictionaryDataSourceFactory::create(self, data)
    }
}

/// Enumerates and orders the candidate value sources for one target member.
pub struct DataSourceFinder {
    map_time_factories: Vec<Rc<dyn MapTimeDataSourceFactory>>,
}

impl Default for DataSourceFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourceFinder {
    pub fn new() -> DataSourceFinder {
        DataSourceFinder {
            map_time_factories: vec![Rc::new(DictionaryDataSourceFactory)],
        }
    }

    pub fn find_for(&self, data: &MemberMapperData) -> DataSourceSet {
        let mut sources: Vec<DataSource> = self
            .enumerate(data)
            .into_iter()
            .filter(|s| s.valid)
            .collect();

        if data.target_is(Classification::Simple) && !sources.is_empty() {
            if let Some(initial) = initial_source_for(data) {
                if initial.valid {
                    sources.insert(0, initial);
                }
            }
        }

        if sources.is_empty() {
            debug!(
                "no data source for {}.{}",
                data.target_root_ty,
                data.target_member.name()
            );
        }

        DataSourceSet::new(sources)
    }

    fn enumerate(&self, data: &MemberMapperData) -> Vec<DataSource> {
        // Map-time factories pre-empt everything for non-complex members;
        // the first applicable factory, by registry order, supplies the
        // sole source.
        if !data.target_is(Classification::Complex) {
            if let Some(factory) = self.map_time_factories.iter().find(|f| f.is_for(data)) {
                return vec![factory.create(data)];
            }
        }

        let mut sources = vec![];
        let mut index = 0;

        let configured = data.ctx.user_config.data_sources_for(data);
        let configured_values = data.ctx.user_config.configured_values_for(data);
        for configured_source in configured {
            let conditional = configured_source.is_conditional();
            sources.push(final_data_source(configured_source, data));

            // An unconditional configured source wins absolutely.
            if !conditional {
                return sources;
            }
            index += 1;
        }

        let best_match = best_source_match(data);

        if data.target_is(Classification::Complex) {
            sources.push(complex_mapping_source(best_match, data));
            return sources;
        }

        let matched = best_match.map(|m| source_member_data_source(m, data));
        match matched {
            Some(m)
                if !configured_values
                    .iter()
                    .any(|v| v.equivalent(&m.value)) =>
            {
                let conditional = m.is_conditional();
                sources.push(final_data_source(m, data));

                // A conditional entry needs a backup.
                if conditional {
                    sources.push(fallback_source_for(data));
                }
            }
            // No match, or it duplicates a configured source: fall back,
            // unless this is position 0 in the chain, which means "no
            // source at all".
            _ => {
                if index > 0 {
                    sources.push(fallback_source_for(data));
                }
            }
        }

        sources
    }
}
