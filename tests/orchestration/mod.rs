mod campaign_flow_test;
mod direct_trigger_test;
mod fan_out_test;
